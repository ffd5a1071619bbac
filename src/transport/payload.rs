use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::LocationSample;

/// Body of one report to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPayload {
    #[serde(rename = "_type")]
    pub kind: String,
    pub lat: f64,
    pub lon: f64,
    /// Send time, unix seconds.
    pub tst: i64,
    pub accuracy: f64,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
}

impl LocationPayload {
    pub fn new(sample: &LocationSample, sent_at: DateTime<Utc>) -> Self {
        LocationPayload {
            kind: "location".to_string(),
            lat: sample.latitude,
            lon: sample.longitude,
            tst: sent_at.timestamp(),
            accuracy: sample.accuracy,
            altitude: sample.altitude,
            speed: sample.speed,
            heading: sample.heading,
        }
    }
}
