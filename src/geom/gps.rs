use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use geo::{coord, Coord, Line, Rect};
use serde::{Deserialize, Serialize};

use crate::geom::crossing::Crossing;
use crate::geom::error::GeomError;
use crate::geom::line::intersection_fraction;
use crate::geom::tile::Tile;
use crate::geom::trip_line::TripLine;

/// Timestamps below this are treated as second-resolution and widened
/// to milliseconds on construction.
const MILLIS_EPOCH_FLOOR: i64 = 15_000_000_000;

/// `GpsPoint`
///
/// A single vehicle ping. Immutable once observed, apart from the one-off
/// zone offset applied at the processing boundary when
/// `convert_to_localtime` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    /// Epoch milliseconds. Arrival order is not guaranteed monotonic.
    pub time: i64,
    pub vehicle_id: u64,
    pub lon: f64,
    pub lat: f64,
    #[serde(default = "localtime_default")]
    pub convert_to_localtime: bool,
}

fn localtime_default() -> bool {
    true
}

impl GpsPoint {
    /// Constructs a point whose timestamp will be shifted to local time
    /// before it enters the trip state machine.
    pub fn new(time: i64, vehicle_id: u64, lon: f64, lat: f64) -> Self {
        // second-resolution feeds are widened to milliseconds
        let time = if time < MILLIS_EPOCH_FLOOR {
            time * 1000
        } else {
            time
        };

        GpsPoint {
            time,
            vehicle_id,
            lon,
            lat,
            convert_to_localtime: true,
        }
    }

    /// Constructs a point whose timestamp is already locally offset.
    pub fn new_utc(time: i64, vehicle_id: u64, lon: f64, lat: f64) -> Self {
        GpsPoint {
            convert_to_localtime: false,
            ..Self::new(time, vehicle_id, lon, lat)
        }
    }

    /// Applies a zone offset, respecting the localtime flag.
    pub fn offset_time(&mut self, offset_ms: i64) {
        if self.convert_to_localtime {
            self.time += offset_ms;
        }
    }

    pub fn coord(&self) -> Coord<f64> {
        coord! { x: self.lon, y: self.lat }
    }

    /// Scheduling tile owning this point at the given zoom.
    pub fn tile(&self, zoom: u8) -> Tile {
        Tile::at(self.lat, self.lon, zoom)
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.time)
    }
}

impl Display for GpsPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.datetime() {
            Some(at) => write!(
                f,
                "vehicle {} at ({}, {}) {}",
                self.vehicle_id,
                self.lon,
                self.lat,
                at.to_rfc3339()
            ),
            None => write!(
                f,
                "vehicle {} at ({}, {}) t={}",
                self.vehicle_id, self.lon, self.lat, self.time
            ),
        }
    }
}

/// `GpsSegment`
///
/// The movement segment between two *consecutive* points of the *same*
/// vehicle. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsSegment {
    p0: GpsPoint,
    p1: GpsPoint,
}

impl GpsSegment {
    pub fn new(p0: GpsPoint, p1: GpsPoint) -> Result<Self, GeomError> {
        if p0.vehicle_id != p1.vehicle_id {
            return Err(GeomError::VehicleMismatch {
                first: p0.vehicle_id,
                second: p1.vehicle_id,
            });
        }

        Ok(GpsSegment { p0, p1 })
    }

    pub fn vehicle_id(&self) -> u64 {
        self.p0.vehicle_id
    }

    /// Segment duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.p1.time - self.p0.time
    }

    /// A stationary vehicle cannot cross anything.
    pub fn is_still(&self) -> bool {
        self.p0.lat == self.p1.lat && self.p0.lon == self.p1.lon
    }

    pub fn line(&self) -> Line<f64> {
        Line::new(self.p0.coord(), self.p1.coord())
    }

    /// Recall-oriented envelope for the candidate trip-line query.
    pub fn bounding_rect(&self) -> Rect<f64> {
        Rect::new(self.p0.coord(), self.p1.coord())
    }

    /// Whether and when this movement crosses the trip line.
    ///
    /// Both fractional positions are checked against `[0, 1]`: the
    /// infinite extension of one segment passing through the other is
    /// not a crossing. The crossing time is interpolated along the
    /// movement's duration.
    pub fn crossing(&self, trip_line: &TripLine) -> Option<Crossing> {
        let movement = self.line();

        let f_move = intersection_fraction(&movement, &trip_line.line)?;
        if !(0.0..=1.0).contains(&f_move) {
            return None;
        }

        let f_line = intersection_fraction(&trip_line.line, &movement)?;
        if !(0.0..=1.0).contains(&f_line) {
            return None;
        }

        let time = self.p0.time + (self.duration_ms() as f64 * f_move) as i64;

        Some(Crossing::new(trip_line.clone(), self.vehicle_id(), time))
    }
}
