#![doc = include_str!("../readme.md")]

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;
#[cfg_attr(feature = "mimalloc", global_allocator)]
#[cfg(feature = "mimalloc")]
static GLOBAL: MiMalloc = MiMalloc;

pub mod engine;
pub mod geom;
pub mod map;
pub mod stats;
pub mod util;

#[doc(inline)]
pub use engine::{Engine, EngineConfig, EngineStatus};
#[doc(inline)]
pub use geom::gps::GpsPoint;
#[doc(inline)]
pub use map::MapData;
#[doc(inline)]
pub use stats::{SampleSink, SpeedSample};

use engine::error::EngineError;
use geom::error::GeomError;
use map::error::MapError;

/// Umbrella error joining the per-module error enums. Submodule errors
/// convert in via [`impl_err!`].
#[derive(Debug)]
pub enum Error {
    Geom(GeomError),
    Map(MapError),
    Engine(EngineError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl_err!(GeomError, Geom);
impl_err!(MapError, Map);
impl_err!(EngineError, Engine);
