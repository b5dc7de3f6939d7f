//! # Admission gate: counting limiter for in-flight units.
//!
//! [`AdmissionGate`] bounds how many units a dispatcher runs at once. It wraps a
//! [`tokio::sync::Semaphore`] and hands out [`AdmissionPermit`]s; dropping a
//! permit returns its slot.
//!
//! ## Rules
//! - `0 <= held <= capacity` at all times
//! - `acquire` only waits, it never fails while the gate is open
//! - a permit releases its slot exactly once, on drop (success, failure, panic
//!   unwinding, abort and cancellation all drop it)
//! - one gate per dispatcher; independent dispatchers have independent limits
//!
//! ```text
//! serve loop ──► acquire() ──► AdmissionPermit ──move──► spawned task
//!                  ▲                                         │
//!                  └──────────── slot returned ◄── drop ◄────┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;

/// Counting resource limiter with a fixed capacity.
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    held: Arc<AtomicUsize>,
    capacity: usize,
}

impl AdmissionGate {
    /// Creates a gate with `capacity` slots.
    ///
    /// Returns [`DispatchError::InvalidCapacity`] for `0` (or more than the
    /// semaphore supports).
    ///
    /// # Example
    /// ```
    /// use fanvisor::AdmissionGate;
    ///
    /// let gate = AdmissionGate::new(2).unwrap();
    /// let p1 = gate.try_acquire().unwrap();
    /// let _p2 = gate.try_acquire().unwrap();
    /// assert!(gate.try_acquire().is_none());
    ///
    /// drop(p1);
    /// assert_eq!(gate.available(), 1);
    /// ```
    pub fn new(capacity: usize) -> Result<Self, DispatchError> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(DispatchError::InvalidCapacity {
                got: capacity,
                max: Semaphore::MAX_PERMITS,
            });
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            held: Arc::new(AtomicUsize::new(0)),
            capacity,
        })
    }

    /// Waits for a free slot and takes it.
    ///
    /// Returns `None` only if the gate has been [closed](Self::close).
    pub async fn acquire(&self) -> Option<AdmissionPermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        Some(self.admit(permit))
    }

    /// Like [`acquire`](Self::acquire), but gives up when `token` is cancelled.
    pub async fn acquire_cancellable(&self, token: &CancellationToken) -> Option<AdmissionPermit> {
        if token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            permit = self.acquire() => permit,
        }
    }

    /// Takes a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        Some(self.admit(permit))
    }

    /// Closes the gate: pending and future acquisitions return `None`.
    ///
    /// Permits already handed out stay valid and still return their slot on drop.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Fixed number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held by permits.
    pub fn held(&self) -> usize {
        self.held.load(Ordering::Acquire)
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> AdmissionPermit {
        let now = self.held.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(now <= self.capacity, "admission gate over capacity: {now}");
        AdmissionPermit {
            held: Arc::clone(&self.held),
            _permit: permit,
        }
    }
}

impl fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("capacity", &self.capacity)
            .field("held", &self.held())
            .field("available", &self.available())
            .finish()
    }
}

/// One held slot of an [`AdmissionGate`]; the slot is returned on drop.
#[must_use = "dropping the permit releases the slot immediately"]
pub struct AdmissionPermit {
    held: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    /// Number of slots held on the gate right now (including this one).
    pub fn in_flight(&self) -> usize {
        self.held.load(Ordering::Acquire)
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        // Counter first; the semaphore slot is returned when `_permit` drops right after.
        let prev = self.held.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "admission gate released more slots than it admitted");
    }
}

impl fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionPermit")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
