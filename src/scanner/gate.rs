use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps simultaneous upstream calls. Backed by tokio's fair semaphore, so
/// waiters are served strictly FIFO and a released slot goes straight to the
/// longest-waiting caller.
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    queued: AtomicUsize,
}

/// A held slot. Dropping it releases the slot.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

/// Decrements the queue counter even if the acquiring future is dropped mid-wait.
struct QueueGuard<'a>(&'a AtomicUsize);

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            queued: AtomicUsize::new(0),
        })
    }

    /// Wait for a slot. No timeout: a hung holder blocks the queue behind it.
    pub async fn acquire(&self) -> GatePermit {
        self.queued.fetch_add(1, Ordering::Relaxed);
        let _guard = QueueGuard(&self.queued);
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("gate semaphore is never closed");
        GatePermit { _permit: permit }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Callers currently inside `acquire` (including the instant before they are granted).
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }
}
