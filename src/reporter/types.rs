use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::source::LocationSample;

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub enum ReporterMode {
    Inactive,
    Active {
        session_id: Uuid,
        started_at: DateTime<Utc>,
    },
}

/// Read-only view of the reporter for status displays.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ReporterStatus {
    pub mode: ReporterMode,
    pub latest_sample: Option<LocationSample>,
    pub interval_seconds: u64,
    pub sent_count: u64,
    pub error_count: u64,
    pub last_sent: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub uptime_seconds: u64,
    pub next_send_in_seconds: Option<u64>,
}
