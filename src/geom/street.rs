use std::fmt::{Display, Formatter};
use std::str::FromStr;

use geo::Line;
use rstar::{RTreeObject, AABB};
use strum::{Display as StrumDisplay, EnumString};

use crate::geom::trip_line::TripLine;

/// Road class parsed from the OSM `highway` tag. The primary bucket
/// folds in the link and trunk variants the way the traffic statistics
/// downstream expect them grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, StrumDisplay)]
pub enum StreetKind {
    #[strum(
        to_string = "primary",
        serialize = "motorway",
        serialize = "trunk",
        serialize = "primary_link",
        serialize = "motorway_link",
        serialize = "unclassified"
    )]
    Primary,
    #[strum(to_string = "secondary")]
    Secondary,
    #[strum(to_string = "tertiary")]
    Tertiary,
    #[strum(to_string = "residential")]
    Residential,
    #[strum(to_string = "other")]
    Other,
    #[strum(to_string = "non_roadway")]
    NonRoadway,
}

impl StreetKind {
    /// Classifies a raw `highway` tag value; absent tags are not roads,
    /// unknown values fall into the catch-all bucket.
    pub fn from_highway(tag: Option<&str>) -> StreetKind {
        match tag {
            None => StreetKind::NonRoadway,
            Some(value) => StreetKind::from_str(value).unwrap_or(StreetKind::Other),
        }
    }

    /// Whether segments of this class carry traffic observations.
    pub fn is_roadway(&self) -> bool {
        !matches!(self, StreetKind::NonRoadway)
    }
}

/// `StreetSegment`
///
/// One directed edge of the segmented road network, between two OSM
/// nodes. Created by the out-of-scope segmentation collaborator; the
/// engine only reads it for gap-bridging contiguity and noise checks.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetSegment {
    pub id: u64,
    pub way_id: u64,
    pub start_node: u64,
    pub end_node: u64,
    /// Road length in meters.
    pub length: f64,
    pub oneway: bool,
    pub kind: StreetKind,
    /// Endpoint geometry, start towards end.
    pub line: Line<f64>,
}

impl StreetSegment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        way_id: u64,
        start_node: u64,
        end_node: u64,
        length: f64,
        oneway: bool,
        kind: StreetKind,
        line: Line<f64>,
    ) -> Self {
        StreetSegment {
            id,
            way_id,
            start_node,
            end_node,
            length,
            oneway,
            kind,
            line,
        }
    }

    /// Whether `next` chains directly onto this segment.
    pub fn contiguous_with(&self, next: &StreetSegment) -> bool {
        self.end_node == next.start_node
    }
}

impl Display for StreetSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ss_{}:{}-{}",
            self.way_id, self.start_node, self.end_node
        )
    }
}

/// The closed set of spatially-indexed kinds. A tagged union rather than
/// a trait hierarchy: each kind needs distinct fields and the set never
/// grows at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialItem {
    TripLine(TripLine),
    Street(StreetSegment),
}

impl SpatialItem {
    pub fn id(&self) -> u64 {
        match self {
            SpatialItem::TripLine(tl) => tl.id,
            SpatialItem::Street(ss) => ss.id,
        }
    }

    pub fn line(&self) -> &Line<f64> {
        match self {
            SpatialItem::TripLine(tl) => &tl.line,
            SpatialItem::Street(ss) => &ss.line,
        }
    }

    pub fn as_trip_line(&self) -> Option<&TripLine> {
        match self {
            SpatialItem::TripLine(tl) => Some(tl),
            _ => None,
        }
    }
}

impl RTreeObject for SpatialItem {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let line = self.line();

        AABB::from_corners(
            [
                line.start.x.min(line.end.x),
                line.start.y.min(line.end.y),
            ],
            [
                line.start.x.max(line.end.x),
                line.start.y.max(line.end.y),
            ],
        )
    }
}
