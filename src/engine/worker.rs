use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use crate::engine::states::VehicleStates;
use crate::map::MapData;
use crate::stats::SampleSink;

/// One member of the fixed worker pool: loops scheduling passes over the
/// shared state until told to shut down. Passes are synchronous; the
/// per-vehicle try-locks keep concurrent passes from colliding.
pub(crate) struct EngineWorker<M, S> {
    id: usize,
    states: Arc<VehicleStates>,
    map: Arc<M>,
    sink: Arc<S>,
    shutdown: Arc<AtomicBool>,
}

impl<M: MapData, S: SampleSink> EngineWorker<M, S> {
    pub(crate) fn new(
        id: usize,
        states: Arc<VehicleStates>,
        map: Arc<M>,
        sink: Arc<S>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        EngineWorker {
            id,
            states,
            map,
            sink,
            shutdown,
        }
    }

    pub(crate) fn run(self) {
        debug!("worker {} started", self.id);

        while !self.shutdown.load(Ordering::Relaxed) {
            self.states
                .process_location_updates(self.map.as_ref(), self.sink.as_ref());

            std::thread::sleep(self.states.config().worker_pass_interval);
        }

        debug!("worker {} stopped", self.id);
    }
}
