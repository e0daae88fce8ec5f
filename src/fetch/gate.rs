//! Bounded concurrency gate for headless browser sessions.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Fixed-size semaphore shared by every rendered fetch.
///
/// A [`RenderPermit`] is acquired before a browser is launched and must be
/// held until the browser is closed; dropping it frees the slot.
#[derive(Debug, Clone)]
pub struct RenderGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// RAII guard for one browser slot.
#[derive(Debug)]
pub struct RenderPermit {
    _permit: OwnedSemaphorePermit,
}

impl RenderGate {
    /// Creates a gate admitting at most `capacity` concurrent sessions.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot.
    ///
    /// Returns `None` only if the gate has been closed.
    pub async fn acquire(&self) -> Option<RenderPermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .ok()
            .map(|permit| RenderPermit { _permit: permit })
    }

    /// Configured number of slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
