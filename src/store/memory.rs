use std::collections::HashMap;
use std::sync::Mutex;

use super::{KeyValueStore, StoreError, StoreKey};

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().unwrap().get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().insert(key, value.to_string());
        Ok(())
    }
}
