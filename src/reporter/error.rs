use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("invalid reporting interval: {0}s")]
    InvalidInterval(u64),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
