use std::fmt::{Display, Formatter};

/// Slippy-map tile at a fixed zoom level, used purely to shard vehicles
/// for scheduling. Many vehicles map to one tile; a vehicle's tile is
/// recomputed from its most recent point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
}

impl Tile {
    /// Web-mercator tile containing the given position.
    pub fn at(lat: f64, lon: f64, zoom: u8) -> Tile {
        let scale = (1u32 << zoom) as f64;

        let x = ((lon + 180.0) / 360.0 * scale).floor() as i32;

        let lat_rad = lat.to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0
            * scale)
            .floor() as i32;

        Tile { x, y }
    }
}

impl Display for Tile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.x, self.y)
    }
}
