//! Speed observations and the statistics-collaborator boundary.

use std::sync::Mutex;

#[doc(hidden)]
pub mod sample;

#[doc(inline)]
pub use sample::SpeedSample;

/// Sink for admissible speed samples, implemented by the out-of-scope
/// statistics store. Fire-and-forget: called from inside the per-vehicle
/// lock, so implementations must not block; queue internally if the
/// backing store is slow.
pub trait SampleSink {
    fn emit(&self, sample: &SpeedSample);
}

/// `MemorySink`
///
/// Collects emitted samples in memory. The reference sink for tests and
/// small embeddings.
#[derive(Debug, Default)]
pub struct MemorySink {
    samples: Mutex<Vec<SpeedSample>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<SpeedSample> {
        self.samples.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SampleSink for MemorySink {
    fn emit(&self, sample: &SpeedSample) {
        self.samples.lock().unwrap().push(*sample);
    }
}
