use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{info, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::config::EngineConfig;
use crate::engine::vehicle::Vehicle;
use crate::engine::EngineStatus;
use crate::geom::{GpsPoint, Tile};
use crate::map::MapData;
use crate::stats::SampleSink;

/// Monotonic event counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counts of expected filtering outcomes and of the one loud invariant
/// failure. Observability only; none of these are errors.
#[derive(Debug, Default)]
pub struct DropCounters {
    /// Pairs spanning longer than the plausible gap, or out of order.
    pub stale_pairs: Counter,
    /// Coincident consecutive points.
    pub still_pairs: Counter,
    /// Samples (measured or synthesized) above the speed ceiling.
    pub speeding_samples: Counter,
    /// Completions rejected for running backwards.
    pub wrong_direction: Counter,
    /// Crossing-order invariant violations (abandoned movements).
    pub order_violations: Counter,
}

/// Membership of vehicles in scheduling tiles. Guarded by one coarse
/// lock: touched once per enqueue/move, far less often than per-point
/// processing.
#[derive(Debug, Default)]
struct TileIndex {
    members: FxHashMap<Tile, FxHashSet<u64>>,
}

impl TileIndex {
    fn place(&mut self, vehicle_id: u64, from: Option<Tile>, to: Tile) {
        if let Some(previous) = from {
            if let Some(members) = self.members.get_mut(&previous) {
                members.remove(&vehicle_id);
                if members.is_empty() {
                    self.members.remove(&previous);
                }
            }
        }

        self.members.entry(to).or_default().insert(vehicle_id);
    }

    fn remove(&mut self, vehicle_id: u64, tile: Tile) {
        if let Some(members) = self.members.get_mut(&tile) {
            members.remove(&vehicle_id);
            if members.is_empty() {
                self.members.remove(&tile);
            }
        }
    }

    fn count(&self, tile: &Tile) -> usize {
        self.members.get(tile).map_or(0, FxHashSet::len)
    }

    /// Snapshot of every tile with its members, densest first.
    fn by_descending_count(&self) -> Vec<(Tile, Vec<u64>)> {
        let mut tiles: Vec<(Tile, Vec<u64>)> = self
            .members
            .iter()
            .map(|(tile, members)| (*tile, members.iter().copied().collect()))
            .collect();

        tiles.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        tiles
    }
}

#[derive(Debug, Default)]
struct RateWindow {
    last_processed: u64,
    last_check: Option<Instant>,
    rate: f64,
}

/// `VehicleStates`
///
/// The scheduler's shared state: the vehicle-actor registry, the tile
/// membership index, idle observations for eviction, and the global
/// queue accounting backing backpressure.
pub struct VehicleStates {
    config: EngineConfig,
    vehicles: scc::HashMap<u64, Arc<Vehicle>>,
    tiles: Mutex<TileIndex>,
    idle_since: Mutex<FxHashMap<u64, Instant>>,
    queued: AtomicI64,
    processed: AtomicU64,
    rate: Mutex<RateWindow>,
    counters: DropCounters,
}

impl VehicleStates {
    pub fn new(config: EngineConfig) -> Self {
        VehicleStates {
            config,
            vehicles: scc::HashMap::new(),
            tiles: Mutex::new(TileIndex::default()),
            idle_since: Mutex::new(FxHashMap::default()),
            queued: AtomicI64::new(0),
            processed: AtomicU64::new(0),
            rate: Mutex::new(RateWindow::default()),
            counters: DropCounters::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn counters(&self) -> &DropCounters {
        &self.counters
    }

    pub fn vehicle(&self, vehicle_id: u64) -> Option<Arc<Vehicle>> {
        self.vehicles.read(&vehicle_id, |_, vehicle| Arc::clone(vehicle))
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn queued_count(&self) -> i64 {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn processing_rate(&self) -> f64 {
        self.rate.lock().unwrap().rate
    }

    pub fn status(&self) -> EngineStatus {
        let counters = self.counters();

        EngineStatus {
            queued: self.queued_count(),
            processed: self.processed_count(),
            processing_rate: self.processing_rate(),
            vehicles: self.vehicle_count(),
            stale_pairs: counters.stale_pairs.get(),
            still_pairs: counters.still_pairs.get(),
            speeding_samples: counters.speeding_samples.get(),
            wrong_direction: counters.wrong_direction.get(),
            order_violations: counters.order_violations.get(),
        }
    }

    pub(crate) fn note_processed(&self) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn place_vehicle_in_tile(&self, vehicle_id: u64, from: Option<Tile>, to: Tile) {
        self.tiles.lock().unwrap().place(vehicle_id, from, to);
    }

    fn vehicle_or_create(&self, vehicle_id: u64) -> Arc<Vehicle> {
        self.vehicles
            .entry(vehicle_id)
            .or_insert_with(|| Arc::new(Vehicle::new(vehicle_id)))
            .get()
            .clone()
    }

    /// The sole ingest boundary. Blocks the producer while the global
    /// queued-point ceiling holds, then hands the point to the owning
    /// actor's queue.
    pub fn enqueue_location_update(&self, point: GpsPoint) {
        while self.queued.load(Ordering::Relaxed) >= self.config.max_queued_locations {
            std::thread::sleep(self.config.backpressure_interval);
        }

        self.queued.fetch_add(1, Ordering::Relaxed);
        self.vehicle_or_create(point.vehicle_id).enqueue(self, point);
    }

    /// One scheduling pass: tiles in descending vehicle count, hot tiles
    /// drained vehicle by vehicle under each actor's try-lock, cold
    /// tiles marked idle-observed, then the eviction sweep.
    pub fn process_location_updates<M: MapData, S: SampleSink>(&self, map: &M, sink: &S) {
        let pass = { self.tiles.lock().unwrap().by_descending_count() };

        for (tile, vehicle_ids) in pass {
            if vehicle_ids.len() >= self.config.minimum_vehicle_count {
                // a single cold-tile fetch must not stall every worker:
                // only drain when the tile is resident or nothing loads
                if map.tile_loaded(&tile) || !map.loading_in_flight() {
                    for vehicle_id in vehicle_ids {
                        self.process_vehicle(vehicle_id, map, sink);
                    }
                }
            } else {
                let mut idle = self.idle_since.lock().unwrap();
                for vehicle_id in vehicle_ids {
                    idle.entry(vehicle_id).or_insert_with(Instant::now);
                }
            }

            self.update_processing_rate();
        }

        self.sweep_idle();
    }

    fn process_vehicle<M: MapData, S: SampleSink>(&self, vehicle_id: u64, map: &M, sink: &S) {
        let Some(vehicle) = self.vehicle(vehicle_id) else {
            return;
        };

        match vehicle.try_process(self, map, sink) {
            // another pass holds the actor; skipped without blocking
            Ok(None) => {}
            Ok(Some(processed)) => {
                let mut idle = self.idle_since.lock().unwrap();
                if processed == 0 || vehicle.queue_depth() == 0 {
                    idle.entry(vehicle_id).or_insert_with(Instant::now);
                } else {
                    idle.remove(&vehicle_id);
                }
            }
            Err(err) => {
                // points stay queued; the vehicle retries next pass
                warn!("vehicle {vehicle_id}: deferred this pass: {err:?}");
            }
        }
    }

    fn update_processing_rate(&self) {
        let mut window = self.rate.lock().unwrap();

        let Some(last_check) = window.last_check else {
            window.last_processed = self.processed_count();
            window.last_check = Some(Instant::now());
            return;
        };

        let elapsed = last_check.elapsed();
        if elapsed > self.config.rate_update_interval {
            let processed = self.processed_count();
            let delta = processed - window.last_processed;

            window.rate = delta as f64 / elapsed.as_secs_f64();
            window.last_processed = processed;
            window.last_check = Some(Instant::now());

            info!("vehicle processing rate: {:.1}/s", window.rate);
        }
    }

    /// Evicts vehicles idle beyond the invalidation window, provided
    /// their tile has gone cold or their queue is confirmed empty.
    /// Eviction drops pending-crossing state: a reappearing vehicle
    /// starts over as if brand new.
    fn sweep_idle(&self) {
        let stale: Vec<u64> = {
            let idle = self.idle_since.lock().unwrap();
            idle.iter()
                .filter(|(_, since)| since.elapsed() > self.config.vehicle_invalidation_time)
                .map(|(vehicle_id, _)| *vehicle_id)
                .collect()
        };

        for vehicle_id in stale {
            let Some(vehicle) = self.vehicle(vehicle_id) else {
                self.idle_since.lock().unwrap().remove(&vehicle_id);
                continue;
            };

            let tile_gone_cold = {
                let tile = *vehicle.tile.lock().unwrap();
                let tiles = self.tiles.lock().unwrap();
                tile.is_some_and(|tile| {
                    tiles.count(&tile) < self.config.minimum_vehicle_count
                })
            };

            if tile_gone_cold || vehicle.queue_depth() == 0 {
                self.remove_vehicle(vehicle_id);
            }
        }
    }

    fn remove_vehicle(&self, vehicle_id: u64) {
        if let Some((_, vehicle)) = self.vehicles.remove(&vehicle_id) {
            // queued points the actor never consumed leave the global
            // accounting with it
            self.queued
                .fetch_sub(vehicle.queue_depth() as i64, Ordering::Relaxed);

            if let Some(tile) = *vehicle.tile.lock().unwrap() {
                self.tiles.lock().unwrap().remove(vehicle_id, tile);
            }
        }

        self.idle_since.lock().unwrap().remove(&vehicle_id);
    }
}
