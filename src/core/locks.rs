use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by string.
///
/// Used to serialize a user's conversation events and to make the
/// record-vote-then-check-counterpart sequence atomic per unordered pair.
/// Entries are never removed; the key space is bounded by the user base.
#[derive(Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Canonical lock key for an unordered user pair: both vote directions of
/// {a, b} contend on the same lock.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("pair:{}|{}", a, b)
    } else {
        format!("pair:{}|{}", b, a)
    }
}
