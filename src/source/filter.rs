use chrono::Duration;

use super::sample::LocationSample;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Drops samples that arrive too soon or too close to the last one emitted.
/// Spacing is measured on `observed_at`, not on arrival time.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    min_distance_m: f64,
    min_spacing: Duration,
    last: Option<LocationSample>,
}

impl SampleFilter {
    pub fn new(min_distance_m: f64, min_spacing: std::time::Duration) -> Self {
        SampleFilter {
            min_distance_m: min_distance_m.max(0.0),
            min_spacing: Duration::from_std(min_spacing).unwrap_or(Duration::zero()),
            last: None,
        }
    }

    pub fn accept(&mut self, sample: &LocationSample) -> bool {
        if let Some(last) = &self.last {
            if sample.observed_at - last.observed_at < self.min_spacing {
                return false;
            }
            if distance_m(last, sample) < self.min_distance_m {
                return false;
            }
        }

        self.last = Some(sample.clone());
        true
    }
}

/// Great-circle distance between two samples (haversine).
pub fn distance_m(a: &LocationSample, b: &LocationSample) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration as StdDuration;

    fn at(lat: f64, lon: f64, secs: i64) -> LocationSample {
        LocationSample {
            observed_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            ..LocationSample::new(lat, lon, 5.0)
        }
    }

    #[test]
    fn distance_matches_known_value() {
        // One degree of latitude is roughly 111.2 km.
        let d = distance_m(&at(55.0, 37.0, 0), &at(56.0, 37.0, 0));
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn first_sample_always_passes() {
        let mut filter = SampleFilter::new(10.0, StdDuration::from_secs(5));
        assert!(filter.accept(&at(55.75, 37.61, 0)));
    }

    #[test]
    fn drops_samples_within_distance() {
        let mut filter = SampleFilter::new(10.0, StdDuration::ZERO);
        assert!(filter.accept(&at(55.75, 37.61, 0)));
        // ~5.5 m north
        assert!(!filter.accept(&at(55.75005, 37.61, 10)));
        // ~111 m north
        assert!(filter.accept(&at(55.751, 37.61, 20)));
    }

    #[test]
    fn drops_samples_arriving_too_soon() {
        let mut filter = SampleFilter::new(0.0, StdDuration::from_secs(5));
        assert!(filter.accept(&at(55.75, 37.61, 0)));
        assert!(!filter.accept(&at(55.76, 37.61, 3)));
        assert!(filter.accept(&at(55.76, 37.61, 5)));
    }

    #[test]
    fn rejected_samples_do_not_move_the_reference_point() {
        let mut filter = SampleFilter::new(10.0, StdDuration::ZERO);
        assert!(filter.accept(&at(55.75, 37.61, 0)));
        // Creep north in small steps; only the last is ~16 m from the anchor.
        assert!(!filter.accept(&at(55.75005, 37.61, 1)));
        assert!(!filter.accept(&at(55.75008, 37.61, 2)));
        assert!(filter.accept(&at(55.75015, 37.61, 3)));
    }
}
