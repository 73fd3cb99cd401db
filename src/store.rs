//! Persistence collaborator.
//!
//! The session never owns long-term storage. It appends every decoded sample
//! and re-reads the stored maximum after each history page, so other writers
//! (imports, background sync) may touch the same store concurrently.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::StoreError;
use crate::types::Sample;

/// Sample storage used by the session.
///
/// Implementations must be idempotent by serial number: appending a serial
/// that already exists is not an error and leaves the stored sample alone.
pub trait SampleStore: Send + Sync + 'static {
    /// Highest serial number persisted so far, `0` when empty.
    fn highest_stored_serial_number(&self) -> Result<u32, StoreError>;

    /// Store a sample. Returns `false` when the serial was already present.
    fn append(&self, sample: &Sample) -> Result<bool, StoreError>;
}

impl<S: SampleStore> SampleStore for Arc<S> {
    fn highest_stored_serial_number(&self) -> Result<u32, StoreError> {
        (**self).highest_stored_serial_number()
    }

    fn append(&self, sample: &Sample) -> Result<bool, StoreError> {
        (**self).append(sample)
    }
}

/// In-memory store keyed by serial number. Clones share the same samples.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    samples: Arc<Mutex<BTreeMap<u32, Sample>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, serial_number: u32) -> Option<Sample> {
        self.lock().get(&serial_number).cloned()
    }

    /// All samples in ascending serial order.
    pub fn samples(&self) -> Vec<Sample> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u32, Sample>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SampleStore for MemoryStore {
    fn highest_stored_serial_number(&self) -> Result<u32, StoreError> {
        Ok(self.lock().keys().next_back().copied().unwrap_or(0))
    }

    fn append(&self, sample: &Sample) -> Result<bool, StoreError> {
        let mut samples = self.lock();
        if samples.contains_key(&sample.serial_number) {
            return Ok(false);
        }
        samples.insert(sample.serial_number, sample.clone());
        Ok(true)
    }
}
