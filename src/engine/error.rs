use crate::geom::error::GeomError;
use crate::impl_err;
use crate::map::error::MapError;

#[derive(Debug)]
pub enum EngineError {
    /// Collaborator lookup failed; the vehicle is skipped this pass and
    /// retried once its points are still queued.
    Map(MapError),
    Geom(GeomError),
    /// Two crossings already ordered by time produced a negative elapsed
    /// interval. A correctness bug in ordering logic, never input noise:
    /// the movement is abandoned loudly rather than sampled.
    CrossingOrder { vehicle_id: u64, dt_ms: i64 },
}

impl_err!(MapError, EngineError, Map);
impl_err!(GeomError, EngineError, Geom);
