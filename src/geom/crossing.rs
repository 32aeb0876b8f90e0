use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::geom::trip_line::TripLine;

/// `Crossing`
///
/// The event of one vehicle movement intersecting a trip line, stamped
/// with the time interpolated along the movement. Ephemeral: produced by
/// the crossing detector, consumed by the trip state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    pub trip_line: TripLine,
    pub vehicle_id: u64,
    /// Interpolated epoch milliseconds.
    pub time: i64,
}

impl Crossing {
    pub fn new(trip_line: TripLine, vehicle_id: u64, time: i64) -> Self {
        Crossing {
            trip_line,
            vehicle_id,
            time,
        }
    }

    /// Whether `next` completes this crossing into a speed-sample pair.
    ///
    /// Completion requires the same street segment, forward index order,
    /// and strictly adjacent indexes. A crossing can never complete
    /// itself, nor can an index-2 crossing complete another index-2.
    pub fn completed_by(&self, next: &Crossing) -> bool {
        if self.trip_line.segment_id != next.trip_line.segment_id {
            return false;
        }

        if self.trip_line.index > next.trip_line.index {
            return false;
        }

        (next.trip_line.index as i16 - self.trip_line.index as i16).abs() == 1
    }

    /// Deterministic ordering within one movement's crossing set: by
    /// interpolated time, ties broken by trip-line id.
    pub fn order(a: &Crossing, b: &Crossing) -> Ordering {
        a.time.cmp(&b.time).then(a.trip_line.id.cmp(&b.trip_line.id))
    }
}

impl Display for Crossing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "vehicle {} crossed {} at {}",
            self.vehicle_id, self.trip_line, self.time
        )
    }
}
