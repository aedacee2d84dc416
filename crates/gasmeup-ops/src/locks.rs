//! In-flight reservations for funding coins and swap sessions.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use gasmeup_types::{ObjectId, Result, SwapError};

/// Funding objects committed to an attempt that has not settled yet.
///
/// Share one instance between engines that can spend the same wallet's coins.
#[derive(Debug, Default)]
pub struct CoinLocks {
    held: Mutex<HashSet<ObjectId>>,
}

impl CoinLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `object_id` until the returned lease is dropped.
    pub fn reserve(self: &Arc<Self>, object_id: &str) -> Result<CoinLease> {
        let mut held = self.held.lock();
        if !held.insert(object_id.to_string()) {
            return Err(SwapError::CoinInUse(object_id.to_string()));
        }
        Ok(CoinLease {
            locks: Arc::clone(self),
            object_id: object_id.to_string(),
        })
    }

    pub fn is_reserved(&self, object_id: &str) -> bool {
        self.held.lock().contains(object_id)
    }
}

/// Releases its coin when dropped, including when the attempt is cancelled.
#[derive(Debug)]
pub struct CoinLease {
    locks: Arc<CoinLocks>,
    object_id: ObjectId,
}

impl CoinLease {
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl Drop for CoinLease {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.object_id);
    }
}

/// Marks a session busy for the lifetime of one attempt.
pub(crate) struct SessionGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> SessionGuard<'a> {
    pub(crate) fn enter(busy: &'a AtomicBool) -> Result<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SwapError::AttemptInProgress)?;
        Ok(Self { busy })
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
