use serde::Serialize;

use crate::store::{KeyValueStore, StoreError, StoreKey};

pub const DEFAULT_INTERVAL_SECONDS: u64 = 30;
pub const MAX_INTERVAL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PersistedCounters {
    pub sent_count: u64,
    pub error_count: u64,
    pub interval_seconds: u64,
}

impl PersistedCounters {
    /// Reads the durable values, falling back to zero counters and
    /// `default_interval` for anything missing or unreadable.
    pub fn load(store: &dyn KeyValueStore, default_interval: u64) -> Result<Self, StoreError> {
        let interval_seconds = match read_u64(store, StoreKey::TrackingInterval)? {
            Some(v) if is_valid_interval(v) => v,
            Some(v) => {
                log::warn!("Ignoring stored interval {}s, using {}s", v, default_interval);
                default_interval
            }
            None => default_interval,
        };

        Ok(PersistedCounters {
            sent_count: read_u64(store, StoreKey::SentCount)?.unwrap_or(0),
            error_count: read_u64(store, StoreKey::ErrorCount)?.unwrap_or(0),
            interval_seconds,
        })
    }

    pub fn value(&self, key: StoreKey) -> u64 {
        match key {
            StoreKey::TrackingInterval => self.interval_seconds,
            StoreKey::SentCount => self.sent_count,
            StoreKey::ErrorCount => self.error_count,
        }
    }
}

pub fn is_valid_interval(seconds: u64) -> bool {
    (1..=MAX_INTERVAL_SECONDS).contains(&seconds)
}

/// Writes one counter. Failures are logged and otherwise ignored.
pub fn persist(store: &dyn KeyValueStore, key: StoreKey, value: u64) {
    if let Err(e) = store.set(key, &value.to_string()) {
        log::warn!("Failed to persist {}: {}", key, e);
    }
}

fn read_u64(store: &dyn KeyValueStore, key: StoreKey) -> Result<Option<u64>, StoreError> {
    Ok(store.get(key)?.and_then(|raw| match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring unreadable {} value {:?}", key, raw);
            None
        }
    }))
}
