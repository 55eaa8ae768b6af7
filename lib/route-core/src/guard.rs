//! Single-flight guard for route table read-modify-write cycles

use crate::{CoreError, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Process-wide lock over one route table
///
/// The provider only supports whole-table replacement, so two cycles running
/// at once would overwrite each other. Acquisition never waits: a held lock
/// turns the call into `CoreError::Busy` and the caller retries later.
#[derive(Clone, Debug)]
pub struct RouteTableLock {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of one cycle, released on drop
#[derive(Debug)]
pub struct RouteTableGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl RouteTableLock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(())),
        }
    }

    /// Try to take the lock for `route_table_id` without waiting
    pub fn try_acquire(&self, route_table_id: &str) -> Result<RouteTableGuard<'_>> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(RouteTableGuard { _guard: guard }),
            Err(_) => {
                warn!("Route table {} is locked, rejecting call", route_table_id);
                Err(CoreError::Busy(route_table_id.to_string()))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl Default for RouteTableLock {
    fn default() -> Self {
        Self::new()
    }
}
