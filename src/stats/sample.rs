use std::fmt::{Display, Formatter};

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// `SpeedSample`
///
/// One admissible speed observation for a street segment, derived from an
/// ordered pair of trip-line crossings (or synthesized across a jumper
/// gap). Immutable; handed to the statistics collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedSample {
    pub segment_id: u64,
    /// Epoch milliseconds of the observation (the opening crossing).
    pub time: i64,
    /// Meters per second.
    pub speed: f64,
}

impl SpeedSample {
    pub fn new(segment_id: u64, time: i64, speed: f64) -> Self {
        SpeedSample {
            segment_id,
            time,
            speed,
        }
    }
}

impl Display for SpeedSample {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match DateTime::from_timestamp_millis(self.time) {
            Some(at) => write!(
                f,
                "segment {} at {}: {:.2} m/s",
                self.segment_id,
                at.to_rfc3339(),
                self.speed
            ),
            None => write!(
                f,
                "segment {} at t={}: {:.2} m/s",
                self.segment_id, self.time, self.speed
            ),
        }
    }
}
