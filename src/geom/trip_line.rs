use std::fmt::{Display, Formatter};

use geo::{coord, Line};

/// `TripLine`
///
/// An immutable short line segment anchored to a street segment, placed
/// near one of its endpoints. `index` 1 always precedes `index` 2 along
/// the direction of travel encoded by the owning segment; `dist` is the
/// linear distance along the road at which the line sits.
#[derive(Debug, Clone, PartialEq)]
pub struct TripLine {
    pub id: u64,
    pub segment_id: u64,
    /// 1 near the segment start, 2 near its end.
    pub index: u8,
    /// Distance along the road, in meters.
    pub dist: f64,
    pub line: Line<f64>,
}

impl TripLine {
    pub fn new(id: u64, segment_id: u64, index: u8, dist: f64, line: Line<f64>) -> Self {
        TripLine {
            id,
            segment_id,
            index,
            dist,
            line,
        }
    }

    /// Convenience constructor from raw endpoint pairs `(lon, lat)`.
    pub fn from_endpoints(
        id: u64,
        segment_id: u64,
        index: u8,
        dist: f64,
        start: (f64, f64),
        end: (f64, f64),
    ) -> Self {
        Self::new(
            id,
            segment_id,
            index,
            dist,
            Line::new(
                coord! { x: start.0, y: start.1 },
                coord! { x: end.0, y: end.1 },
            ),
        )
    }
}

impl Display for TripLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "tl_{}-{}", self.segment_id, self.index)
    }
}
