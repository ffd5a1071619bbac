mod counters;
mod error;
mod reporter;
mod types;

pub use counters::{PersistedCounters, DEFAULT_INTERVAL_SECONDS, MAX_INTERVAL_SECONDS};
pub use error::ReporterError;
pub use reporter::Reporter;
pub use types::{ReporterMode, ReporterStatus};
