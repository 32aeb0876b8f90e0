//! Road-network collaborator contract and the bundled in-memory
//! reference implementation. The persistent spatial store is out of
//! scope; the engine only ever talks to [`MapData`].

use geo::Rect;

#[doc(hidden)]
pub mod error;
#[doc(hidden)]
pub mod jumpers;
#[doc(hidden)]
pub mod memory;
#[doc(hidden)]
#[cfg(test)]
mod test;

#[doc(inline)]
pub use jumpers::JumperIndex;
#[doc(inline)]
pub use memory::MemoryMapData;

use crate::geom::{Jumper, StreetSegment, Tile, TripLine};
use error::MapError;

/// Spatial collaborator queried from inside the per-vehicle processing
/// pass. Implementations must be callable from many worker threads at
/// once.
pub trait MapData: Send + Sync {
    /// Every trip line whose geometry could intersect the envelope.
    /// Over-approximation is acceptable; the crossing detector enforces
    /// exactness.
    fn trip_lines(&self, envelope: &Rect<f64>) -> Result<Vec<TripLine>, MapError>;

    /// Street segment lookup for gap-bridging contiguity checks.
    fn street_segment(&self, segment_id: u64) -> Result<Option<StreetSegment>, MapError>;

    /// Virtual chain bridging `start_node` to `end_node`, if one exists.
    fn jumper(&self, start_node: u64, end_node: u64) -> Result<Option<Jumper>, MapError>;

    /// Zone offset in milliseconds for a position, applied to raw
    /// timestamps that request localtime conversion.
    fn zone_offset(&self, lat: f64, lon: f64) -> Result<i64, MapError>;

    /// Whether road data for the tile is resident. Tiles with resident
    /// data are always drainable.
    fn tile_loaded(&self, tile: &Tile) -> bool;

    /// Whether a road-data load is currently in flight. While one is,
    /// the scheduler avoids queueing more cold tiles behind it.
    fn loading_in_flight(&self) -> bool;
}
