use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use geo::{coord, Line, Rect};

use crate::engine::config::EngineConfig;
use crate::engine::states::VehicleStates;
use crate::engine::Engine;
use crate::geom::{GpsPoint, StreetKind, StreetSegment, Tile, TripLine};
use crate::map::error::MapError;
use crate::map::{MapData, MemoryMapData};
use crate::stats::MemorySink;

/// Epoch base keeping test timestamps in millisecond range.
const T0: i64 = 1_700_000_000_000;
const SEGMENT: u64 = 1;

fn test_config() -> EngineConfig {
    EngineConfig {
        minimum_vehicle_count: 1,
        workers: 1,
        ..EngineConfig::default()
    }
}

fn street(id: u64, start_node: u64, end_node: u64, length: f64, x0: f64, x1: f64) -> StreetSegment {
    StreetSegment::new(
        id,
        id,
        start_node,
        end_node,
        length,
        false,
        StreetKind::Residential,
        Line::new(coord! { x: x0, y: 0.0 }, coord! { x: x1, y: 0.0 }),
    )
}

fn vertical(id: u64, segment_id: u64, index: u8, dist: f64, x: f64) -> TripLine {
    TripLine::from_endpoints(id, segment_id, index, dist, (x, -0.001), (x, 0.001))
}

/// One 100m street along the equator with its trip-line pair.
fn single_segment_map() -> MemoryMapData {
    let map = MemoryMapData::default();

    map.insert_street_segment(street(SEGMENT, 10, 11, 100.0, 0.0, 0.001));
    map.insert_trip_line(vertical(101, SEGMENT, 1, 20.0, 0.0001));
    map.insert_trip_line(vertical(102, SEGMENT, 2, 80.0, 0.0007));

    map
}

/// Three pings: away from the lines, past index 1 (crossing at T0+500),
/// past index 2 (crossing at T0+3500). 60m in 3s: exactly 20 m/s.
fn scenario_points(vehicle_id: u64) -> [GpsPoint; 3] {
    [
        GpsPoint::new_utc(T0, vehicle_id, 0.0, 0.0),
        GpsPoint::new_utc(T0 + 2_000, vehicle_id, 0.0004, 0.0),
        GpsPoint::new_utc(T0 + 4_000, vehicle_id, 0.0008, 0.0),
    ]
}

fn drive(
    states: &VehicleStates,
    map: &impl MapData,
    sink: &MemorySink,
    points: impl IntoIterator<Item = GpsPoint>,
) {
    for point in points {
        states.enqueue_location_update(point);
    }

    states.process_location_updates(map, sink);
}

#[test_log::test]
fn first_point_yields_nothing() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());

    drive(&states, &map, &sink, [GpsPoint::new_utc(T0, 1, 0.0004, 0.0)]);

    assert!(sink.is_empty());
    assert_eq!(states.processed_count(), 1);
    assert_eq!(states.queued_count(), 0);
}

#[test_log::test]
fn stationary_vehicle_yields_nothing() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());

    drive(
        &states,
        &map,
        &sink,
        [
            GpsPoint::new_utc(T0, 1, 0.0004, 0.0),
            GpsPoint::new_utc(T0 + 1_000, 1, 0.0004, 0.0),
        ],
    );

    assert!(sink.is_empty());
    assert_eq!(states.status().still_pairs, 1);
}

#[test_log::test]
fn stale_and_out_of_order_pairs_are_rejected() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());

    // 30s between fixes: over the plausible pairing window
    drive(
        &states,
        &map,
        &sink,
        [
            GpsPoint::new_utc(T0, 1, 0.0, 0.0),
            GpsPoint::new_utc(T0 + 30_000, 1, 0.0004, 0.0),
        ],
    );

    // a fix arriving from the past
    drive(
        &states,
        &map,
        &sink,
        [GpsPoint::new_utc(T0 + 20_000, 1, 0.0008, 0.0)],
    );

    assert!(sink.is_empty());
    assert_eq!(states.status().stale_pairs, 2);

    let vehicle = states.vehicle(1).expect("vehicle resident");
    assert_eq!(vehicle.pending_crossings(), 0);
}

#[test_log::test]
fn ordered_pair_of_crossings_yields_calibrated_sample() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());

    drive(&states, &map, &sink, scenario_points(1));

    let samples = sink.samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].segment_id, SEGMENT);
    // stamped at the opening crossing
    assert_eq!(samples[0].time, T0 + 500);
    // 60m between the lines over the 3s between crossings
    assert_relative_eq!(samples[0].speed, 20.0, epsilon = 1e-9);

    assert_eq!(states.processed_count(), 3);
    assert_eq!(states.queued_count(), 0);

    // the completing crossing cleared the pending set
    let vehicle = states.vehicle(1).expect("vehicle resident");
    assert_eq!(vehicle.pending_crossings(), 0);
}

#[test_log::test]
fn index_one_crossing_is_retained_as_pending() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());

    let [a, b, _] = scenario_points(1);
    drive(&states, &map, &sink, [a, b]);

    assert!(sink.is_empty());

    let vehicle = states.vehicle(1).expect("vehicle resident");
    let state = vehicle.state.lock().unwrap();
    assert_eq!(state.pending.len(), 1);
    assert_eq!(state.pending[0].trip_line.index, 1);
    assert_eq!(state.pending[0].time, T0 + 500);
}

#[test_log::test]
fn newer_unrelated_opening_replaces_pending() {
    let map = single_segment_map();
    // a second street whose entry line sits inside the same movement
    map.insert_street_segment(street(2, 20, 21, 100.0, 0.0002, 0.0012));
    map.insert_trip_line(vertical(201, 2, 1, 20.0, 0.0003));

    let states = VehicleStates::new(test_config());
    let sink = MemorySink::new();

    let [a, b, _] = scenario_points(1);
    drive(&states, &map, &sink, [a, b]);

    assert!(sink.is_empty());

    // both openings crossed; only the newer one survives
    let vehicle = states.vehicle(1).expect("vehicle resident");
    let state = vehicle.state.lock().unwrap();
    assert_eq!(state.pending.len(), 1);
    assert_eq!(state.pending[0].trip_line.id, 201);
}

#[test_log::test]
fn backwards_traversal_yields_nothing() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());

    drive(
        &states,
        &map,
        &sink,
        [
            GpsPoint::new_utc(T0, 1, 0.0008, 0.0),
            GpsPoint::new_utc(T0 + 2_000, 1, 0.0004, 0.0),
            GpsPoint::new_utc(T0 + 4_000, 1, 0.0, 0.0),
        ],
    );

    assert!(sink.is_empty());

    // the index-1 crossing opened a pair that never completes
    let vehicle = states.vehicle(1).expect("vehicle resident");
    let state = vehicle.state.lock().unwrap();
    assert_eq!(state.pending.len(), 1);
    assert_eq!(state.pending[0].trip_line.id, 101);
}

#[test_log::test]
fn implausible_speeds_are_rejected() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());

    // both lines crossed within 150ms: 400 m/s of GPS junk
    drive(
        &states,
        &map,
        &sink,
        [
            GpsPoint::new_utc(T0, 1, 0.0, 0.0),
            GpsPoint::new_utc(T0 + 200, 1, 0.0008, 0.0),
        ],
    );

    assert!(sink.is_empty());
    assert_eq!(states.status().speeding_samples, 1);
}

#[test_log::test]
fn gap_across_short_segment_is_bridged() {
    let map = MemoryMapData::default();

    // two trackable streets joined by a 40m stub with no trip lines
    map.insert_street_segment(street(1, 10, 11, 100.0, 0.0, 0.001));
    map.insert_street_segment(street(3, 11, 12, 40.0, 0.001, 0.0014));
    map.insert_street_segment(street(2, 12, 13, 100.0, 0.0014, 0.0024));

    map.insert_trip_line(vertical(101, 1, 1, 20.0, 0.0002));
    map.insert_trip_line(vertical(102, 1, 2, 80.0, 0.0008));
    map.insert_trip_line(vertical(201, 2, 1, 20.0, 0.0016));
    map.insert_trip_line(vertical(202, 2, 2, 80.0, 0.0022));

    let states = VehicleStates::new(test_config());
    let sink = MemorySink::new();

    drive(
        &states,
        &map,
        &sink,
        [
            GpsPoint::new_utc(T0, 1, 0.0001, 0.0),
            GpsPoint::new_utc(T0 + 10_000, 1, 0.0005, 0.0),
            GpsPoint::new_utc(T0 + 20_000, 1, 0.0009, 0.0),
            GpsPoint::new_utc(T0 + 30_000, 1, 0.0017, 0.0),
            GpsPoint::new_utc(T0 + 40_000, 1, 0.0023, 0.0),
        ],
    );

    let samples = sink.samples();
    assert_eq!(samples.len(), 3);

    // the measured sample on the first street
    assert_eq!(samples[0].segment_id, 1);
    assert_eq!(samples[0].time, T0 + 2_500);
    assert_relative_eq!(samples[0].speed, 4.0, epsilon = 1e-6);

    // the synthesized sample attributed to the stub: 40m plus the 60m
    // margin each side, over the 26.25s between the real samples
    assert_eq!(samples[1].segment_id, 3);
    assert_eq!(samples[1].time, samples[2].time);
    assert_relative_eq!(samples[1].speed, 160.0 / 26.25, max_relative = 1e-3);

    // the measured sample on the second street
    assert_eq!(samples[2].segment_id, 2);
    assert_eq!(samples[2].time, T0 + 28_750);
    assert_relative_eq!(samples[2].speed, 60.0 / 9.583, max_relative = 1e-3);
}

#[test_log::test]
fn collaborator_failure_leaves_points_queued() {
    struct FlakyMap {
        inner: MemoryMapData,
        fail: AtomicBool,
    }

    impl MapData for FlakyMap {
        fn trip_lines(&self, envelope: &Rect<f64>) -> Result<Vec<TripLine>, MapError> {
            self.inner.trip_lines(envelope)
        }

        fn street_segment(&self, id: u64) -> Result<Option<StreetSegment>, MapError> {
            self.inner.street_segment(id)
        }

        fn jumper(&self, start: u64, end: u64) -> Result<Option<crate::geom::Jumper>, MapError> {
            self.inner.jumper(start, end)
        }

        fn zone_offset(&self, lat: f64, lon: f64) -> Result<i64, MapError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(MapError::Unavailable("zone store offline".into()));
            }
            self.inner.zone_offset(lat, lon)
        }

        fn tile_loaded(&self, tile: &Tile) -> bool {
            self.inner.tile_loaded(tile)
        }

        fn loading_in_flight(&self) -> bool {
            self.inner.loading_in_flight()
        }
    }

    let map = FlakyMap {
        inner: single_segment_map(),
        fail: AtomicBool::new(true),
    };

    let states = VehicleStates::new(test_config());
    let sink = MemorySink::new();

    let [a, b, _] = scenario_points(1);
    drive(&states, &map, &sink, [a, b]);

    // nothing consumed, nothing lost
    assert_eq!(states.processed_count(), 0);
    assert_eq!(states.queued_count(), 2);
    assert_eq!(states.vehicle(1).unwrap().queue_depth(), 2);

    // the backing store recovers; the backlog drains on the next pass
    map.fail.store(false, Ordering::Relaxed);
    states.process_location_updates(&map, &sink);

    assert_eq!(states.processed_count(), 2);
    assert_eq!(states.queued_count(), 0);
    assert_eq!(states.vehicle(1).unwrap().pending_crossings(), 1);
}

#[test_log::test]
fn sparse_tiles_are_not_drained() {
    let config = EngineConfig {
        minimum_vehicle_count: 10,
        vehicle_invalidation_time: Duration::from_millis(50),
        ..EngineConfig::default()
    };

    let states = VehicleStates::new(config);
    let (map, sink) = (single_segment_map(), MemorySink::new());

    let [a, b, _] = scenario_points(1);
    drive(&states, &map, &sink, [a, b]);

    // one vehicle does not justify loading the tile
    assert_eq!(states.processed_count(), 0);
    assert_eq!(states.queued_count(), 2);

    // and idle-observed vehicles on cold tiles are eventually evicted,
    // backlog and all
    std::thread::sleep(Duration::from_millis(60));
    states.process_location_updates(&map, &sink);

    assert_eq!(states.vehicle_count(), 0);
    assert_eq!(states.queued_count(), 0);
}

#[test_log::test]
fn loads_in_flight_defer_unloaded_tiles() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());
    map.set_loading(true);

    let [a, b, _] = scenario_points(1);
    drive(&states, &map, &sink, [a, b]);

    assert_eq!(states.processed_count(), 0);

    // once this tile's data is resident it drains, load or no load
    map.mark_tile_loaded(Tile::at(0.0, 0.0, states.config().tile_zoom));
    states.process_location_updates(&map, &sink);

    assert_eq!(states.processed_count(), 2);
}

#[test_log::test]
fn tile_change_stops_the_pass_and_moves_membership() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());

    drive(
        &states,
        &map,
        &sink,
        [
            GpsPoint::new_utc(T0, 1, 0.0, 0.5),
            GpsPoint::new_utc(T0 + 1_000, 1, 1.0, 0.5),
        ],
    );

    // the second point mapped to a new tile; it waits for the next pass
    assert_eq!(states.processed_count(), 1);
    assert_eq!(states.vehicle(1).unwrap().queue_depth(), 1);

    states.process_location_updates(&map, &sink);

    assert_eq!(states.processed_count(), 2);
    assert_eq!(states.vehicle(1).unwrap().queue_depth(), 0);
}

#[test_log::test]
fn eviction_resets_a_vehicle_completely() {
    let config = EngineConfig {
        minimum_vehicle_count: 1,
        vehicle_invalidation_time: Duration::from_millis(50),
        ..EngineConfig::default()
    };

    let states = VehicleStates::new(config);
    let (map, sink) = (single_segment_map(), MemorySink::new());

    let [a, b, c] = scenario_points(1);
    drive(&states, &map, &sink, [a, b]);
    assert_eq!(states.vehicle(1).unwrap().pending_crossings(), 1);

    // idle past the invalidation window with an empty queue
    std::thread::sleep(Duration::from_millis(60));
    states.process_location_updates(&map, &sink);
    assert_eq!(states.vehicle_count(), 0);

    // the reappearing vehicle starts cold: the open pair is gone, so
    // the completing crossing alone yields nothing
    drive(&states, &map, &sink, [b, c]);

    assert!(sink.is_empty());
    assert_eq!(states.vehicle(1).unwrap().pending_crossings(), 0);
}

#[test_log::test]
fn try_lock_denies_overlapping_processing() {
    let states = VehicleStates::new(test_config());
    let (map, sink) = (single_segment_map(), MemorySink::new());

    let [a, b, _] = scenario_points(1);
    states.enqueue_location_update(a);
    states.enqueue_location_update(b);

    let vehicle = states.vehicle(1).expect("vehicle resident");

    {
        let _held = vehicle.state.lock().unwrap();

        // a second caller is denied entry while the state is held
        let denied = vehicle.try_process(&states, &map, &sink).unwrap();
        assert!(denied.is_none());
        assert_eq!(vehicle.queue_depth(), 2);
    }

    let processed = vehicle.try_process(&states, &map, &sink).unwrap();
    assert_eq!(processed, Some(2));
}

#[test_log::test]
fn concurrent_vehicles_never_share_state() {
    const VEHICLES: u64 = 8;

    let states = Arc::new(VehicleStates::new(test_config()));
    let map = Arc::new(single_segment_map());
    let sink = Arc::new(MemorySink::new());

    for vehicle_id in 1..=VEHICLES {
        for point in scenario_points(vehicle_id) {
            states.enqueue_location_update(point);
        }
    }

    let passes: Vec<_> = (0..4)
        .map(|_| {
            let (states, map, sink) = (Arc::clone(&states), Arc::clone(&map), Arc::clone(&sink));
            std::thread::spawn(move || {
                for _ in 0..3 {
                    states.process_location_updates(map.as_ref(), sink.as_ref());
                }
            })
        })
        .collect();

    for pass in passes {
        pass.join().unwrap();
    }

    // one sample per vehicle, no duplicates, no cross-talk
    let samples = sink.samples();
    assert_eq!(samples.len(), VEHICLES as usize);
    for sample in &samples {
        assert_relative_eq!(sample.speed, 20.0, epsilon = 1e-9);
    }

    assert_eq!(states.processed_count(), VEHICLES * 3);
    assert_eq!(states.queued_count(), 0);

    for vehicle_id in 1..=VEHICLES {
        let vehicle = states.vehicle(vehicle_id).expect("vehicle resident");
        assert!(vehicle.pending_crossings() <= 1);
    }
}

#[test_log::test]
fn producers_block_at_the_queue_ceiling() {
    let config = EngineConfig {
        minimum_vehicle_count: 1,
        max_queued_locations: 2,
        backpressure_interval: Duration::from_millis(5),
        ..EngineConfig::default()
    };

    let states = Arc::new(VehicleStates::new(config));
    let map = Arc::new(single_segment_map());
    let sink = Arc::new(MemorySink::new());

    let producer = {
        let states = Arc::clone(&states);
        std::thread::spawn(move || {
            let [a, b, c] = scenario_points(1);
            let d = GpsPoint::new_utc(T0 + 6_000, 1, 0.0009, 0.0);

            // the third enqueue blocks until a pass drains the backlog
            for point in [a, b, c, d] {
                states.enqueue_location_update(point);
            }
        })
    };

    let deadline = Instant::now() + Duration::from_secs(10);
    while states.processed_count() < 4 {
        assert!(Instant::now() < deadline, "backpressure never released");
        states.process_location_updates(map.as_ref(), sink.as_ref());
        std::thread::sleep(Duration::from_millis(2));
    }

    producer.join().unwrap();
    assert_eq!(states.queued_count(), 0);
}

#[test_log::test]
fn engine_runs_the_scenario_end_to_end() {
    let config = EngineConfig {
        minimum_vehicle_count: 1,
        workers: 2,
        worker_pass_interval: Duration::from_millis(10),
        ..EngineConfig::default()
    };

    let map = Arc::new(single_segment_map());
    let sink = Arc::new(MemorySink::new());

    let mut engine = Engine::new(config, Arc::clone(&map), Arc::clone(&sink));
    engine.start();

    for point in scenario_points(1) {
        engine.enqueue(point);
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while sink.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    engine.stop();

    let samples = sink.samples();
    assert_eq!(samples.len(), 1);
    assert_relative_eq!(samples[0].speed, 20.0, epsilon = 1e-9);

    let status = engine.status();
    assert_eq!(status.processed, 3);
    assert_eq!(status.queued, 0);
    assert_eq!(status.vehicles, 1);
}
