//! Primary key allocation.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use tracing::debug;

/// Hands out unique, increasing primary keys.
///
/// The allocator starts uninitialized; the owning backend reads the
/// highest persisted key once and calls [`initialize`](Self::initialize).
/// Each allocator is owned by one backend instance.
#[derive(Debug, Default)]
pub struct PkAllocator {
    next: Mutex<Option<u64>>,
}

impl PkAllocator {
    /// Creates an uninitialized allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `next` as the next key to hand out.
    ///
    /// A counter that is already further ahead is kept, so keys are never
    /// reissued.
    pub fn initialize(&self, next: u64) {
        let mut guard = self.next.lock();
        let value = match *guard {
            Some(current) if current >= next => current,
            _ => next,
        };
        *guard = Some(value);
        debug!(next = value, "primary key allocator initialized");
    }

    /// Returns whether [`initialize`](Self::initialize) has been called.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.next.lock().is_some()
    }

    /// Allocates the next key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PkNotInitialized`] before initialization, and a
    /// configuration error once the key space is exhausted.
    pub fn new_pk(&self) -> CoreResult<u64> {
        let mut guard = self.next.lock();
        let current = (*guard).ok_or(CoreError::PkNotInitialized)?;
        let successor = current
            .checked_add(1)
            .ok_or_else(|| CoreError::configuration("primary key space exhausted"))?;
        *guard = Some(successor);
        Ok(current)
    }

    /// Returns the key the next [`new_pk`](Self::new_pk) call would return.
    #[must_use]
    pub fn peek_next(&self) -> Option<u64> {
        *self.next.lock()
    }
}
