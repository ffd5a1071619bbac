use std::sync::Mutex;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::error::PushError;
use super::filter::SampleFilter;
use super::sample::LocationSample;
use super::{LocationEvent, LocationSource, Permission, Subscription, WatchOptions};

struct PushTarget {
    tx: mpsc::Sender<LocationEvent>,
    filter: SampleFilter,
}

/// Samples handed in from outside the process, e.g. a phone posting its
/// position to the control API. Pushes are only accepted while somebody is
/// subscribed.
pub struct PushSource {
    permission: Permission,
    target: Mutex<Option<PushTarget>>,
}

impl PushSource {
    pub fn new() -> Self {
        Self::with_permission(Permission::Granted)
    }

    /// A source nobody is allowed to push to should be built `Denied`, so
    /// the reporter refuses to start instead of waiting forever.
    pub fn with_permission(permission: Permission) -> Self {
        PushSource {
            permission,
            target: Mutex::new(None),
        }
    }

    /// Returns `Ok(false)` when the sample was dropped by the subscription's
    /// distance or spacing filter.
    pub fn push(&self, sample: LocationSample) -> Result<bool, PushError> {
        if !sample.is_valid() {
            return Err(PushError::InvalidSample);
        }

        let mut locked = self.target.lock().unwrap();
        if locked.as_ref().is_some_and(|t| t.tx.is_closed()) {
            *locked = None;
        }
        let target = locked.as_mut().ok_or(PushError::NotSubscribed)?;

        let permit = target.tx.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => PushError::Backlogged,
            TrySendError::Closed(()) => PushError::NotSubscribed,
        })?;

        if !target.filter.accept(&sample) {
            return Ok(false);
        }

        permit.send(Ok(sample));
        Ok(true)
    }

    pub fn is_subscribed(&self) -> bool {
        self.target
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|t| !t.tx.is_closed())
    }
}

impl Default for PushSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationSource for PushSource {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn subscribe(&self, options: &WatchOptions) -> Subscription {
        let (tx, rx) = Subscription::channel();
        let filter = SampleFilter::new(options.distance_filter_m, options.fastest_interval);

        *self.target.lock().unwrap() = Some(PushTarget { tx, filter });
        Subscription::new(rx, None)
    }
}
