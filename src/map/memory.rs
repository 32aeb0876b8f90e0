use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use geo::Rect;
use log::info;
use rstar::{RTree, AABB};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::config::{DEFAULT_MIN_SEGMENT_LEN, DEFAULT_ZONE_OFFSET_MS};
use crate::geom::{Jumper, SpatialItem, StreetSegment, Tile, TripLine};
use crate::map::error::MapError;
use crate::map::jumpers::JumperIndex;
use crate::map::MapData;

/// `MemoryMapData`
///
/// R-tree-backed in-memory [`MapData`] implementation. The reference
/// collaborator for tests and single-process embeddings: street segments
/// and trip lines are indexed as [`SpatialItem`]s, and inserting a street
/// segment below the minimum trackable length registers it with the
/// jumper index automatically.
pub struct MemoryMapData {
    index: RwLock<RTree<SpatialItem>>,
    streets: RwLock<FxHashMap<u64, StreetSegment>>,
    jumpers: RwLock<JumperIndex>,
    loaded_tiles: RwLock<FxHashSet<Tile>>,
    loading: AtomicBool,
    zone_offset_ms: i64,
    min_segment_len: f64,
}

impl Default for MemoryMapData {
    fn default() -> Self {
        Self::new(DEFAULT_ZONE_OFFSET_MS, DEFAULT_MIN_SEGMENT_LEN)
    }
}

impl MemoryMapData {
    pub fn new(zone_offset_ms: i64, min_segment_len: f64) -> Self {
        MemoryMapData {
            index: RwLock::new(RTree::new()),
            streets: RwLock::new(FxHashMap::default()),
            jumpers: RwLock::new(JumperIndex::new()),
            loaded_tiles: RwLock::new(FxHashSet::default()),
            loading: AtomicBool::new(false),
            zone_offset_ms,
            min_segment_len,
        }
    }

    pub fn insert_trip_line(&self, trip_line: TripLine) {
        self.index
            .write()
            .unwrap()
            .insert(SpatialItem::TripLine(trip_line));
    }

    /// Indexes a street segment. Segments shorter than the minimum
    /// trackable length never received trip lines from the segmenter, so
    /// they are stitched into the jumper index instead.
    pub fn insert_street_segment(&self, segment: StreetSegment) {
        if segment.length < self.min_segment_len {
            self.jumpers.write().unwrap().insert(Jumper::from(&segment));
        }

        self.index
            .write()
            .unwrap()
            .insert(SpatialItem::Street(segment.clone()));
        self.streets.write().unwrap().insert(segment.id, segment);
    }

    pub fn insert_jumper(&self, jumper: Jumper) {
        self.jumpers.write().unwrap().insert(jumper);
    }

    /// Marks a tile's road data resident. Resident tiles drain even
    /// while loads for other tiles are still in flight.
    pub fn mark_tile_loaded(&self, tile: Tile) {
        if self.loaded_tiles.write().unwrap().insert(tile) {
            info!("road data for tile {tile} resident");
        }
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::Release);
    }
}

impl MapData for MemoryMapData {
    fn trip_lines(&self, envelope: &Rect<f64>) -> Result<Vec<TripLine>, MapError> {
        let bbox = AABB::from_corners(
            [envelope.min().x, envelope.min().y],
            [envelope.max().x, envelope.max().y],
        );

        Ok(self
            .index
            .read()
            .unwrap()
            .locate_in_envelope_intersecting(&bbox)
            .filter_map(SpatialItem::as_trip_line)
            .cloned()
            .collect())
    }

    fn street_segment(&self, segment_id: u64) -> Result<Option<StreetSegment>, MapError> {
        Ok(self.streets.read().unwrap().get(&segment_id).cloned())
    }

    fn jumper(&self, start_node: u64, end_node: u64) -> Result<Option<Jumper>, MapError> {
        Ok(self
            .jumpers
            .read()
            .unwrap()
            .get(start_node, end_node)
            .cloned())
    }

    fn zone_offset(&self, _lat: f64, _lon: f64) -> Result<i64, MapError> {
        Ok(self.zone_offset_ms)
    }

    fn tile_loaded(&self, tile: &Tile) -> bool {
        self.loaded_tiles.read().unwrap().contains(tile)
    }

    fn loading_in_flight(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }
}
