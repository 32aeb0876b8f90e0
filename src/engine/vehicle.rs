use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, error, trace};
use smallvec::SmallVec;

use crate::engine::error::EngineError;
use crate::engine::states::VehicleStates;
use crate::geom::{Crossing, GpsPoint, GpsSegment, StreetSegment, Tile};
use crate::map::MapData;
use crate::stats::{SampleSink, SpeedSample};

/// Trip-machine state owned exclusively by the processing pass holding
/// the actor's try-lock.
#[derive(Debug, Default)]
pub(crate) struct TripState {
    pub(crate) last_point: Option<GpsPoint>,
    /// Unresolved crossings awaiting completion. Index-1-only retention
    /// keeps this at zero or one live entry.
    pub(crate) pending: SmallVec<[Crossing; 2]>,
    pub(crate) last_segment: Option<StreetSegment>,
    pub(crate) last_segment_time: Option<i64>,
    pub(crate) last_update: Option<Instant>,
}

/// `Vehicle`
///
/// Actor owning one vehicle's ordered location queue and trip state.
/// The queue is the only part touched concurrently: the scheduler
/// enqueues under a short queue lock while at most one worker drains
/// under the state try-lock.
pub struct Vehicle {
    pub vehicle_id: u64,
    queue: Mutex<VecDeque<GpsPoint>>,
    pub(crate) queue_depth: AtomicU64,
    pub(crate) state: Mutex<TripState>,
    pub(crate) tile: Mutex<Option<Tile>>,
}

impl Vehicle {
    pub(crate) fn new(vehicle_id: u64) -> Self {
        Vehicle {
            vehicle_id,
            queue: Mutex::new(VecDeque::new()),
            queue_depth: AtomicU64::new(0),
            state: Mutex::new(TripState::default()),
            tile: Mutex::new(None),
        }
    }

    pub fn queue_depth(&self) -> u64 {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Count of unresolved pending crossings; zero or one by invariant.
    pub fn pending_crossings(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    pub(crate) fn enqueue(&self, states: &VehicleStates, point: GpsPoint) {
        {
            let mut tile = self.tile.lock().unwrap();
            if tile.is_none() {
                let at = point.tile(states.config().tile_zoom);
                states.place_vehicle_in_tile(self.vehicle_id, None, at);
                *tile = Some(at);
            }
        }

        self.queue.lock().unwrap().push_back(point);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    fn peek_front(&self) -> Option<GpsPoint> {
        self.queue.lock().unwrap().front().copied()
    }

    fn pop_front(&self) {
        if self.queue.lock().unwrap().pop_front().is_some() {
            self.queue_depth.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Drains the backlog in arrival order, emitting admissible speed
    /// samples to the sink. Returns `None` when another pass already
    /// holds this actor's lock; otherwise the count of points consumed.
    ///
    /// A point is only popped once every collaborator lookup it needed
    /// has succeeded, so a [`MapError`](crate::map::error::MapError)
    /// leaves it queued for a later pass.
    pub(crate) fn try_process<M: MapData, S: SampleSink>(
        &self,
        states: &VehicleStates,
        map: &M,
        sink: &S,
    ) -> Result<Option<u64>, EngineError> {
        let Ok(mut state) = self.state.try_lock() else {
            return Ok(None);
        };

        let mut processed = 0u64;

        loop {
            let Some(mut point) = self.peek_front() else {
                break;
            };

            let current_tile = point.tile(states.config().tile_zoom);
            {
                let mut tile = self.tile.lock().unwrap();
                if *tile != Some(current_tile) {
                    // membership must reflect the move before the next
                    // scheduling decision; remaining backlog drains on a
                    // later pass under the new tile
                    states.place_vehicle_in_tile(self.vehicle_id, *tile, current_tile);
                    *tile = Some(current_tile);
                    break;
                }
            }

            let offset = map.zone_offset(point.lat, point.lon)?;
            point.offset_time(offset);

            let prev = state.last_point;
            let samples = match prev {
                None => Vec::new(),
                Some(prev) => match self.on_movement(&mut state, prev, point, states, map) {
                    Ok(samples) => samples,
                    Err(err @ EngineError::CrossingOrder { .. }) => {
                        // ordering-logic bug: abandon this movement
                        // loudly instead of poisoning the statistics
                        error!("vehicle {}: {:?}", self.vehicle_id, err);
                        states.counters().order_violations.increment();
                        state.pending.clear();
                        Vec::new()
                    }
                    Err(err) => return Err(err),
                },
            };

            self.pop_front();
            state.last_point = Some(point);
            state.last_update = Some(Instant::now());
            states.note_processed();
            processed += 1;

            for sample in &samples {
                trace!("vehicle {}: {}", self.vehicle_id, sample);
                sink.emit(sample);
            }
        }

        Ok(Some(processed))
    }

    /// One movement segment through the trip state machine. Mutates the
    /// trip state only after every fallible lookup has succeeded.
    fn on_movement<M: MapData>(
        &self,
        state: &mut TripState,
        prev: GpsPoint,
        point: GpsPoint,
        states: &VehicleStates,
        map: &M,
    ) -> Result<Vec<SpeedSample>, EngineError> {
        let config = states.config();
        let counters = states.counters();

        // pairs spanning too long (or arriving out of order) may not be
        // colinear to a street; not useful
        let duration_ms = point.time - prev.time;
        if duration_ms < 0 || duration_ms > config.max_gps_pair_duration.as_millis() as i64 {
            counters.stale_pairs.increment();
            return Ok(Vec::new());
        }

        let segment = GpsSegment::new(prev, point)?;

        if segment.is_still() {
            counters.still_pairs.increment();
            return Ok(Vec::new());
        }

        let crossings = Self::crossings_in_order(&segment, map)?;

        let mut pending = state.pending.clone();
        let mut last_segment = state.last_segment.clone();
        let mut last_segment_time = state.last_segment_time;
        let mut samples = Vec::new();

        for crossing in crossings {
            let completed = Self::complete_pending(&mut pending, &crossing);

            let Some(opening) = completed else {
                continue;
            };

            let Some(sample) = Self::admissible_sample(&opening, &crossing, states)? else {
                continue;
            };

            let current = map.street_segment(sample.segment_id)?;

            if let (Some(last), Some(next)) = (last_segment.as_ref(), current.as_ref()) {
                if !last.contiguous_with(next) {
                    if let Some(jumper) = map.jumper(last.end_node, next.start_node)? {
                        if let Some(gap_start) = last_segment_time {
                            let gap = jumper.speed_samples(
                                gap_start,
                                sample.time,
                                config.min_segment_len,
                            );

                            // synthesized samples obey the same noise
                            // ceiling as measured ones
                            if gap.iter().all(|s| s.speed <= config.max_speed) {
                                samples.extend(gap);
                            } else {
                                counters.speeding_samples.increment();
                            }
                        }
                    }
                }
            }

            last_segment_time = Some(sample.time);
            last_segment = current;
            samples.push(sample);
        }

        state.pending = pending;
        state.last_segment = last_segment;
        state.last_segment_time = last_segment_time;

        if !samples.is_empty() {
            debug!(
                "vehicle {}: movement yielded {} sample(s)",
                self.vehicle_id,
                samples.len()
            );
        }

        Ok(samples)
    }

    /// Candidate trip lines from the spatial collaborator, run through
    /// the exact crossing detector, ordered deterministically by
    /// interpolated time.
    fn crossings_in_order<M: MapData>(
        segment: &GpsSegment,
        map: &M,
    ) -> Result<Vec<Crossing>, EngineError> {
        let candidates = map.trip_lines(&segment.bounding_rect())?;

        Ok(candidates
            .iter()
            .filter_map(|trip_line| segment.crossing(trip_line))
            .sorted_by(Crossing::order)
            .collect())
    }

    /// Resolves a crossing against the pending set. A completion clears
    /// the *entire* set: any sibling still pending is an abandoned
    /// drop-off. Only index-1 crossings are retained as new pending
    /// entries, and retention replaces whatever was pending, so the set
    /// never holds more than one crossing. Index-2 crossings can
    /// complete but never open a pair.
    fn complete_pending(
        pending: &mut SmallVec<[Crossing; 2]>,
        crossing: &Crossing,
    ) -> Option<Crossing> {
        let completed = pending
            .iter()
            .find(|candidate| candidate.completed_by(crossing))
            .cloned();

        if completed.is_some() {
            pending.clear();
        }

        if crossing.trip_line.index == 1 {
            pending.clear();
            pending.push(crossing.clone());
        }

        completed
    }

    /// Builds the speed sample for a completed pair, or `None` when the
    /// pair is inadmissible (wrong direction, zero elapsed time,
    /// implausible speed). A negative elapsed time between crossings
    /// already ordered by time is an invariant violation, not noise.
    fn admissible_sample(
        opening: &Crossing,
        closing: &Crossing,
        states: &VehicleStates,
    ) -> Result<Option<SpeedSample>, EngineError> {
        let config = states.config();
        let counters = states.counters();

        // no speeds for vehicles heading up the road the wrong way
        if closing.trip_line.index < opening.trip_line.index {
            counters.wrong_direction.increment();
            return Ok(None);
        }

        let ds = (closing.trip_line.dist - opening.trip_line.dist).abs();
        let dt_ms = closing.time - opening.time;

        if dt_ms < 0 {
            return Err(EngineError::CrossingOrder {
                vehicle_id: opening.vehicle_id,
                dt_ms,
            });
        }

        if dt_ms == 0 || ds <= 0.0 {
            return Ok(None);
        }

        let speed = ds / (dt_ms as f64 / 1000.0);

        if speed > config.max_speed {
            counters.speeding_samples.increment();
            return Ok(None);
        }

        Ok(Some(SpeedSample::new(
            opening.trip_line.segment_id,
            opening.time,
            speed,
        )))
    }
}
