use serde::{Deserialize, Serialize};

use crate::geom::street::StreetSegment;
use crate::stats::SpeedSample;

/// `Jumper`
///
/// A virtual chain bridging street segments too short to carry their own
/// trip lines. Connects a network break between `start_node` and
/// `end_node`, remembering every underlying segment id it subsumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jumper {
    pub start_node: u64,
    pub end_node: u64,
    /// Total chain length in meters.
    pub length: f64,
    pub segments: Vec<u64>,
}

impl From<&StreetSegment> for Jumper {
    fn from(segment: &StreetSegment) -> Self {
        Jumper {
            start_node: segment.start_node,
            end_node: segment.end_node,
            length: segment.length,
            segments: vec![segment.id],
        }
    }
}

impl Jumper {
    /// Concatenates two chains sharing exactly one endpoint in the
    /// compatible orientation; `None` when they do not join.
    pub fn merge(&self, other: &Jumper) -> Option<Jumper> {
        let (start_node, end_node) = if self.start_node == other.end_node {
            (other.start_node, self.end_node)
        } else if self.end_node == other.start_node {
            (self.start_node, other.end_node)
        } else {
            return None;
        };

        let mut segments = self.segments.clone();
        segments.extend_from_slice(&other.segments);

        Some(Jumper {
            start_node,
            end_node,
            length: self.length + other.length,
            segments,
        })
    }

    /// Synthesizes one speed sample per subsumed segment, spanning the
    /// elapsed time between the two real samples either side of the gap.
    /// The chain's fixed length is widened by the minimum trackable
    /// segment length at each end, since the real samples were taken
    /// inside the neighbouring segments rather than at their nodes.
    pub fn speed_samples(
        &self,
        start_time: i64,
        end_time: i64,
        min_segment_len: f64,
    ) -> Vec<SpeedSample> {
        let dt = (end_time - start_time) as f64 / 1000.0;
        if dt <= 0.0 {
            return Vec::new();
        }

        let speed = (self.length + min_segment_len * 2.0) / dt;

        self.segments
            .iter()
            .map(|&segment_id| SpeedSample::new(segment_id, end_time, speed))
            .collect()
    }
}
