mod error;
mod filter;
mod gpsd;
mod push;
mod sample;

pub use error::{LocationError, PushError};
pub use gpsd::GpsdSource;
pub use push::PushSource;
pub use sample::LocationSample;

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type LocationEvent = Result<LocationSample, LocationError>;

const EVENT_BUFFER: usize = 16;

/// Constraints a subscription must honor.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Minimum movement in meters before a new sample is emitted.
    pub distance_filter_m: f64,
    /// Nominal spacing between samples.
    pub interval: Duration,
    /// Lower bound on sample spacing.
    pub fastest_interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            high_accuracy: true,
            distance_filter_m: 10.0,
            interval: Duration::from_secs(10),
            fastest_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

pub trait LocationSource: Send + Sync {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn subscribe(&self, options: &WatchOptions) -> Subscription;
}

/// A live stream of location events. Dropping or cancelling it tears the
/// producer down.
pub struct Subscription {
    events: mpsc::Receiver<LocationEvent>,
    producer: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn channel() -> (mpsc::Sender<LocationEvent>, mpsc::Receiver<LocationEvent>) {
        mpsc::channel(EVENT_BUFFER)
    }

    pub fn new(events: mpsc::Receiver<LocationEvent>, producer: Option<JoinHandle<()>>) -> Self {
        Subscription { events, producer }
    }

    pub async fn next(&mut self) -> Option<LocationEvent> {
        self.events.recv().await
    }

    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.events.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}
