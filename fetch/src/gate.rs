//! Admission gate
//!
//! Caps simultaneous outbound requests across every query sharing the gate.
//! Clones share the same slots.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the duration of one outbound request; dropping it frees the slot
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a free slot, giving up as soon as `cancel` fires
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GatePermit, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            permit = Arc::clone(&self.slots).acquire_owned() => permit
                .map(|permit| GatePermit { _permit: permit })
                .map_err(|_| FetchError::Cancelled),
        }
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(crate::config::FetchConfig::default().gate_capacity)
    }
}
