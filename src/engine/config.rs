use std::time::Duration;

/// Calibrated noise ceiling, not a legal limit: anything faster is
/// assumed to be GPS junk. Meters per second (~112 km/h).
pub const DEFAULT_MAX_SPEED: f64 = 31.0;

/// Max time between two successive fixes from one vehicle. Longer pairs
/// may not be colinear to a street and are thrown out.
pub const DEFAULT_MAX_GPS_PAIR_DURATION: Duration = Duration::from_secs(20);

/// Minimum trackable street-segment length: three times the 20m margin
/// trip lines are inset from intersections. Shorter segments are bridged
/// by jumpers.
pub const DEFAULT_MIN_SEGMENT_LEN: f64 = 60.0;

/// Zoom level vehicles and road-data areas are sharded at.
pub const DEFAULT_TILE_ZOOM: u8 = 11;

/// Tiles with fewer mapped vehicles than this are not drained in a pass;
/// sharding amortizes the spatial-query cost across many vehicles.
pub const DEFAULT_MINIMUM_VEHICLE_COUNT: usize = 10;

/// Idle window after which a vehicle with no newly-processed points is
/// eligible for eviction.
pub const DEFAULT_VEHICLE_INVALIDATION_TIME: Duration = Duration::from_secs(60 * 5);

/// Global ceiling on queued-but-unprocessed points; producers sleep and
/// retry above it.
pub const DEFAULT_MAX_QUEUED_LOCATIONS: i64 = 1_000_000;

/// Fallback zone offset for the in-memory map store.
pub const DEFAULT_ZONE_OFFSET_MS: i64 = 0;

/// `EngineConfig`
///
/// Every tunable of the processing core, with the calibrated defaults
/// above. Construct with struct-update syntax over `Default`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_speed: f64,
    pub max_gps_pair_duration: Duration,
    pub min_segment_len: f64,
    pub tile_zoom: u8,
    pub minimum_vehicle_count: usize,
    pub vehicle_invalidation_time: Duration,
    pub max_queued_locations: i64,
    /// Worker threads running scheduling passes.
    pub workers: usize,
    /// Sleep between two scheduling passes of one worker.
    pub worker_pass_interval: Duration,
    /// Sleep between producer retries while the queue ceiling holds.
    pub backpressure_interval: Duration,
    /// Minimum elapsed time between processing-rate recomputations.
    pub rate_update_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_speed: DEFAULT_MAX_SPEED,
            max_gps_pair_duration: DEFAULT_MAX_GPS_PAIR_DURATION,
            min_segment_len: DEFAULT_MIN_SEGMENT_LEN,
            tile_zoom: DEFAULT_TILE_ZOOM,
            minimum_vehicle_count: DEFAULT_MINIMUM_VEHICLE_COUNT,
            vehicle_invalidation_time: DEFAULT_VEHICLE_INVALIDATION_TIME,
            max_queued_locations: DEFAULT_MAX_QUEUED_LOCATIONS,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2),
            worker_pass_interval: Duration::from_millis(500),
            backpressure_interval: Duration::from_secs(1),
            rate_update_interval: Duration::from_secs(5),
        }
    }
}
