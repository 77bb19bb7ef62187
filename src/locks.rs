//! Per-user turn serialization.
//!
//! A turn is load → respond → save. Two turns for the same user running at
//! once would each save a state missing the other's exchange, so the
//! orchestrator holds the user's lock for the whole turn. Different users
//! never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use crate::store::UserKey;

#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<UserKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`'s state.
    pub async fn lock(&self, key: &UserKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Entries only referenced by the map have no holder or waiter.
            map.retain(|k, slot| k == key || Arc::strong_count(slot) > 1);
            Arc::clone(map.entry(key.clone()).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of users with a lock entry, held or idle.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
