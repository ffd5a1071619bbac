mod file;
#[cfg(test)]
mod memory;

pub use file::FileStore;
#[cfg(test)]
pub use memory::MemoryStore;

use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keys of the durable reporter state. Values are string-encoded integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StoreKey {
    TrackingInterval,
    SentCount,
    ErrorCount,
}

impl StoreKey {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Result<Option<String>, StoreError>;
    fn set(&self, key: StoreKey, value: &str) -> Result<(), StoreError>;
}
