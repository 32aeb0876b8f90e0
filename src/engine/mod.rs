//! The concurrent processing core: per-vehicle actors, the tile-sharded
//! scheduler, and the worker pool driving both.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::info;

#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod error;
#[doc(hidden)]
pub mod states;
#[doc(hidden)]
#[cfg(test)]
mod test;
#[doc(hidden)]
pub mod vehicle;
#[doc(hidden)]
pub mod worker;

#[doc(inline)]
pub use config::EngineConfig;
#[doc(inline)]
pub use states::VehicleStates;
#[doc(inline)]
pub use vehicle::Vehicle;

use crate::geom::GpsPoint;
use crate::map::MapData;
use crate::stats::SampleSink;
use worker::EngineWorker;

/// Read-only operator snapshot of the engine's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatus {
    /// Points enqueued but not yet consumed.
    pub queued: i64,
    /// Points consumed since start.
    pub processed: u64,
    /// Points per second over the last rate window.
    pub processing_rate: f64,
    /// Vehicle actors currently resident.
    pub vehicles: usize,
    pub stale_pairs: u64,
    pub still_pairs: u64,
    pub speeding_samples: u64,
    pub wrong_direction: u64,
    pub order_violations: u64,
}

/// `Engine`
///
/// Facade owning the scheduler state, the collaborators and the worker
/// pool. [`Engine::enqueue`] is the sole entry point for GPS pings;
/// admissible speed samples flow out through the [`SampleSink`].
pub struct Engine<M, S> {
    states: Arc<VehicleStates>,
    map: Arc<M>,
    sink: Arc<S>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl<M, S> Engine<M, S>
where
    M: MapData + 'static,
    S: SampleSink + Send + Sync + 'static,
{
    pub fn new(config: EngineConfig, map: Arc<M>, sink: Arc<S>) -> Self {
        Engine {
            states: Arc::new(VehicleStates::new(config)),
            map,
            sink,
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    /// Spawns the worker pool. Idempotent once running.
    pub fn start(&mut self) {
        if !self.workers.is_empty() {
            return;
        }

        self.shutdown.store(false, Ordering::Relaxed);
        let count = self.states.config().workers;

        for id in 0..count {
            let worker = EngineWorker::new(
                id,
                Arc::clone(&self.states),
                Arc::clone(&self.map),
                Arc::clone(&self.sink),
                Arc::clone(&self.shutdown),
            );

            self.workers
                .push(std::thread::spawn(move || worker.run()));
        }

        info!("engine started with {count} worker(s)");
    }

    /// Enqueues one raw GPS ping, blocking while the global queue
    /// ceiling holds.
    pub fn enqueue(&self, point: GpsPoint) {
        self.states.enqueue_location_update(point);
    }

    pub fn status(&self) -> EngineStatus {
        self.states.status()
    }

    pub fn states(&self) -> &Arc<VehicleStates> {
        &self.states
    }

    /// Signals the workers and joins them. In-flight passes complete;
    /// queued points simply remain for a later `start`.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }

        info!("engine stopped");
    }
}

impl<M, S> Drop for Engine<M, S> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
