use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::types::StudentId;

const PRUNE_THRESHOLD: usize = 1024;

/// Serializes read-modify-write work per student. Different students never
/// contend.
#[derive(Debug, Default)]
pub struct StudentLocks {
    inner: Mutex<HashMap<StudentId, Arc<AsyncMutex<()>>>>,
}

impl StudentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, student_id: StudentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock();
            if locks.len() >= PRUNE_THRESHOLD {
                // Entries only referenced by the map are idle.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(student_id).or_default())
        };
        lock.lock_owned().await
    }
}
