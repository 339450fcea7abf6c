//! Encrypted key-value store boundary

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Platform key-value storage (encrypted at rest by the host)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn remove_item(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
struct KvState {
    items: HashMap<String, String>,
    reads_fail: bool,
    writes_fail: bool,
    removes_fail: bool,
}

/// HashMap-backed store with switchable failure modes
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    state: Mutex<KvState>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reads_fail(&self, fails: bool) {
        self.state.lock().reads_fail = fails;
    }

    pub fn set_writes_fail(&self, fails: bool) {
        self.state.lock().writes_fail = fails;
    }

    pub fn set_removes_fail(&self, fails: bool) {
        self.state.lock().removes_fail = fails;
    }

    /// Raw read that bypasses failure modes
    pub fn peek(&self, key: &str) -> Option<String> {
        self.state.lock().items.get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.writes_fail {
            return Err(Error::Storage(format!("Failed to write {}", key)));
        }
        state.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let state = self.state.lock();
        if state.reads_fail {
            return Err(Error::Storage(format!("Failed to read {}", key)));
        }
        Ok(state.items.get(key).cloned())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.removes_fail {
            return Err(Error::Storage(format!("Failed to remove {}", key)));
        }
        state.items.remove(key);
        Ok(())
    }
}
