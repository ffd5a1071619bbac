use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LocationError {
    #[error("location source unavailable: {0}")]
    Unavailable(String),
    #[error("location source disconnected")]
    Disconnected,
    #[error("malformed location report: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("no active location subscription")]
    NotSubscribed,
    #[error("location subscription is backlogged")]
    Backlogged,
    #[error("invalid sample")]
    InvalidSample,
}
