//! Which collections live sessions in this process are using.
//!
//! Sessions loading the same document through the same store share one
//! collection. A [`Lease`] is held for as long as a session has that
//! collection loaded; a collection is only deleted by its last holder, and
//! only while holding the collection's gate so that a concurrent load waits
//! for the deletion to finish instead of attaching to a vanishing collection.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use docqa_rag::VectorStore;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Store allocation address and collection name.
type Key = (usize, String);

struct Entry {
    holders: usize,
    gate: Arc<AsyncMutex<()>>,
}

static LIVE: LazyLock<Mutex<HashMap<Key, Entry>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// One session's claim on a collection. Released on drop.
pub(crate) struct Lease {
    key: Key,
    gate: Arc<AsyncMutex<()>>,
}

impl Lease {
    pub(crate) fn acquire(store: &Arc<dyn VectorStore>, collection: &str) -> Self {
        let key = (Arc::as_ptr(store) as *const () as usize, collection.to_string());
        let mut live = LIVE.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = live
            .entry(key.clone())
            .or_insert_with(|| Entry { holders: 0, gate: Arc::new(AsyncMutex::new(())) });
        entry.holders += 1;
        Self { key, gate: Arc::clone(&entry.gate) }
    }

    /// Serialize building and deleting the collection.
    pub(crate) async fn lock(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.gate).lock_owned().await
    }

    /// Whether another live session holds the same collection.
    pub(crate) fn is_shared(&self) -> bool {
        let live = LIVE.lock().unwrap_or_else(PoisonError::into_inner);
        live.get(&self.key).is_some_and(|entry| entry.holders > 1)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut live = LIVE.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = live.get_mut(&self.key) {
            entry.holders -= 1;
            if entry.holders == 0 {
                live.remove(&self.key);
            }
        }
    }
}
