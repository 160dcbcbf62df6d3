//! Single-flight slot for the pending refresh
//!
//! Holds at most one in-flight operation. Callers either attach to the
//! operation already running or, if the slot is empty, start a new one. The
//! start decision runs under the slot lock, so two callers can never both
//! decide to start.
//!
//! The operation runs as a spawned task: it completes and runs its side
//! effects even if every caller stops waiting. The slot is cleared by the task
//! itself before its output becomes visible to any waiter, so a caller that
//! observes the result can immediately start the next operation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

/// Shared handle to an in-flight operation. Resolves to `None` if the task
/// panicked or was cancelled by runtime shutdown.
pub type Flight<T> = Shared<BoxFuture<'static, Option<T>>>;

struct InFlight<T> {
    id: u64,
    flight: Flight<T>,
}

type Slot<T> = Arc<Mutex<Option<InFlight<T>>>>;

fn lock<T>(slot: &Mutex<Option<InFlight<T>>>) -> MutexGuard<'_, Option<InFlight<T>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the slot when the task finishes, panics or is dropped, but only if
/// the slot still holds this task's flight.
struct ClearOnDrop<T> {
    slot: Slot<T>,
    id: u64,
}

impl<T> Drop for ClearOnDrop<T> {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.as_ref().is_some_and(|in_flight| in_flight.id == self.id) {
            *slot = None;
        }
    }
}

/// At-most-one in-flight operation producing a cloneable `T`.
pub struct SingleFlight<T> {
    slot: Slot<T>,
    next_id: AtomicU64,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the operation in flight, or ask `start` for a new one.
    ///
    /// `start` runs under the slot lock and only when the slot is empty. It
    /// returns `None` to decline starting, in which case this returns `None`.
    /// Must be called within a tokio runtime.
    pub fn join_or_start<F>(&self, start: impl FnOnce() -> Option<F>) -> Option<Flight<T>>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if let Some(in_flight) = slot.as_ref() {
            return Some(in_flight.flight.clone());
        }

        let work = start()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = ClearOnDrop {
            slot: Arc::clone(&self.slot),
            id,
        };
        let handle = tokio::spawn(async move {
            let output = work.await;
            drop(guard);
            output
        });
        let flight: Flight<T> = async move { handle.await.ok() }.boxed().shared();

        *slot = Some(InFlight {
            id,
            flight: flight.clone(),
        });
        Some(flight)
    }

    /// The operation in flight, if any.
    pub fn current(&self) -> Option<Flight<T>> {
        lock(&self.slot).as_ref().map(|in_flight| in_flight.flight.clone())
    }

    pub fn is_in_flight(&self) -> bool {
        lock(&self.slot).is_some()
    }

    /// Forget the operation in flight. It keeps running; the next caller
    /// starts a fresh one.
    pub fn reset(&self) {
        *lock(&self.slot) = None;
    }
}
