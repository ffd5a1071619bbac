use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, utoipa::ToSchema)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Ground speed in m/s.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Course over ground in degrees from true north.
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        LocationSample {
            latitude,
            longitude,
            accuracy,
            altitude: None,
            speed: None,
            heading: None,
            observed_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy.is_finite()
            && self.accuracy >= 0.0
    }
}
