mod http;
mod payload;

pub use http::HttpTransport;
pub use payload::LocationPayload;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("collector responded with HTTP {0}")]
    Status(u16),
}

/// Delivers one report to the collector. `Ok` means the collector
/// acknowledged it with a 2xx status.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &LocationPayload) -> Result<(), SendError>;
}
