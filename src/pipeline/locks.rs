use crate::workspace::AppId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-identifier exclusion. Operations on one application queue behind each
/// other; different applications never contend.
#[derive(Default)]
pub struct AppLocks {
    locks: Mutex<HashMap<AppId, Arc<AsyncMutex<()>>>>,
}

impl AppLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &AppId) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(*id).or_default().clone()
    }

    /// Waits for exclusive access to `id`; released when the guard drops
    pub async fn acquire(&self, id: &AppId) -> OwnedMutexGuard<()> {
        self.slot(id).lock_owned().await
    }

    /// Drops the slot for a removed application. Callers must hold its guard.
    pub fn forget(&self, id: &AppId) {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.remove(id);
    }
}
