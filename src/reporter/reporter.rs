use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use uuid::Uuid;

use super::counters::{is_valid_interval, persist, PersistedCounters};
use super::error::ReporterError;
use super::types::{ReporterMode, ReporterStatus};
use crate::source::{
    LocationError, LocationSample, LocationSource, Permission, Subscription, WatchOptions,
};
use crate::store::{KeyValueStore, StoreKey};
use crate::transport::{LocationPayload, Transport};

#[derive(Debug, Clone)]
struct TrackingSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    latest_sample: Option<LocationSample>,
    next_send_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Shared {
    counters: PersistedCounters,
    session: Option<TrackingSession>,
    last_sent: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// State reachable from the worker and its in-flight sends. Store writes
/// happen outside `shared`; `store_lock` orders them and each one writes the
/// value current at that moment, so durable counters never go backwards.
struct Context {
    shared: StdMutex<Shared>,
    store_lock: StdMutex<()>,
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn Transport>,
}

impl Context {
    fn on_location_update(&self, sample: LocationSample) {
        let mut locked = self.shared.lock().unwrap();
        if let Some(session) = locked.session.as_mut() {
            session.latest_sample = Some(sample);
        }
    }

    fn on_location_error(&self, err: &LocationError) {
        log::warn!("Location error: {}", err);
        self.record_error(err.to_string());
    }

    fn on_send_tick(self: &Arc<Self>, sends: &mut JoinSet<()>) {
        let sample = {
            let mut locked = self.shared.lock().unwrap();
            let interval = locked.counters.interval_seconds;
            let Some(session) = locked.session.as_mut() else {
                return;
            };
            session.next_send_at = Some(Utc::now() + chrono::Duration::seconds(interval as i64));
            session.latest_sample.clone()
        };

        let Some(sample) = sample else {
            log::debug!("No location yet, skipping send");
            return;
        };

        let ctx = self.clone();
        sends.spawn(async move { ctx.send(sample).await });
    }

    async fn send(&self, sample: LocationSample) {
        let payload = LocationPayload::new(&sample, Utc::now());

        match self.transport.send(&payload).await {
            Ok(()) => {
                {
                    let mut locked = self.shared.lock().unwrap();
                    locked.counters.sent_count += 1;
                    locked.last_sent = Some(Utc::now());
                }
                self.flush(StoreKey::SentCount);
                log::info!("Sent location {:.6}, {:.6}", payload.lat, payload.lon);
            }
            Err(e) => {
                log::warn!("Failed to send location: {}", e);
                self.record_error(format!("send failed: {}", e));
            }
        }
    }

    fn record_error(&self, message: String) {
        {
            let mut locked = self.shared.lock().unwrap();
            locked.counters.error_count += 1;
            locked.last_error = Some(message);
        }
        self.flush(StoreKey::ErrorCount);
    }

    fn flush(&self, key: StoreKey) {
        let _ordered = self.store_lock.lock().unwrap();
        let value = self.shared.lock().unwrap().counters.value(key);
        persist(self.store.as_ref(), key, value);
    }

    fn schedule_next_send(&self, period: Duration) {
        let mut locked = self.shared.lock().unwrap();
        if let Some(session) = locked.session.as_mut() {
            session.next_send_at = chrono::Duration::from_std(period)
                .ok()
                .map(|period| Utc::now() + period);
        }
    }
}

struct Rearm {
    period: Duration,
    from: Instant,
}

struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    rearm_tx: mpsc::UnboundedSender<Rearm>,
    join: JoinHandle<()>,
}

/// Periodic location reporter. While active it owns exactly one location
/// subscription and one send timer, both driven by a single worker task.
pub struct Reporter {
    source: Arc<dyn LocationSource>,
    watch: WatchOptions,
    ctx: Arc<Context>,
    worker: Option<WorkerHandle>,
}

impl Reporter {
    pub fn new(
        source: Arc<dyn LocationSource>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
        watch: WatchOptions,
        default_interval: u64,
    ) -> Result<Self, ReporterError> {
        let counters = PersistedCounters::load(store.as_ref(), default_interval)?;
        log::info!(
            "Loaded counters: {} sent, {} errors, interval {}s",
            counters.sent_count,
            counters.error_count,
            counters.interval_seconds
        );

        Ok(Self {
            source,
            watch,
            ctx: Arc::new(Context {
                shared: StdMutex::new(Shared {
                    counters,
                    session: None,
                    last_sent: None,
                    last_error: None,
                }),
                store_lock: StdMutex::new(()),
                store,
                transport,
            }),
            worker: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    pub fn status(&self) -> ReporterStatus {
        let locked = self.ctx.shared.lock().unwrap();
        let now = Utc::now();

        let (mode, latest_sample, uptime_seconds, next_send_in_seconds) = match &locked.session {
            Some(session) => (
                ReporterMode::Active {
                    session_id: session.id,
                    started_at: session.started_at,
                },
                session.latest_sample.clone(),
                (now - session.started_at).num_seconds().max(0) as u64,
                session
                    .next_send_at
                    .map(|at| (at - now).num_seconds().max(0) as u64),
            ),
            None => (ReporterMode::Inactive, None, 0, None),
        };

        ReporterStatus {
            mode,
            latest_sample,
            interval_seconds: locked.counters.interval_seconds,
            sent_count: locked.counters.sent_count,
            error_count: locked.counters.error_count,
            last_sent: locked.last_sent,
            last_error: locked.last_error.clone(),
            uptime_seconds,
            next_send_in_seconds,
        }
    }

    /// Opens the location subscription and arms the send timer. Calling it
    /// while already active does nothing.
    pub fn start(&mut self) -> Result<ReporterMode, ReporterError> {
        if self.worker.is_some() {
            return Ok(self.status().mode);
        }

        if self.source.permission() == Permission::Denied {
            log::warn!("Cannot start tracking: location permission denied");
            self.ctx.record_error("location permission denied".to_string());
            return Err(ReporterError::PermissionDenied);
        }

        let armed_at = Instant::now();
        let session = TrackingSession {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            latest_sample: None,
            next_send_at: None,
        };
        let mode = ReporterMode::Active {
            session_id: session.id,
            started_at: session.started_at,
        };

        let period = {
            let mut locked = self.ctx.shared.lock().unwrap();
            locked.session = Some(session);
            Duration::from_secs(locked.counters.interval_seconds)
        };

        let subscription = self.source.subscribe(&self.watch);
        let (stop_tx, stop_rx) = oneshot::channel();
        let (rearm_tx, rearm_rx) = mpsc::unbounded_channel();

        let join = tokio::spawn(run_reporter_loop(
            self.ctx.clone(),
            subscription,
            Rearm {
                period,
                from: armed_at,
            },
            stop_rx,
            rearm_rx,
        ));

        self.worker = Some(WorkerHandle {
            stop_tx,
            rearm_tx,
            join,
        });

        log::info!("Tracking started, reporting every {}s", period.as_secs());
        Ok(mode)
    }

    /// Tears down the subscription, the timer and any in-flight sends. Once
    /// this returns nothing touches the counters until the next `start`.
    ///
    /// The session is cleared before the worker is awaited, so a caller that
    /// gives up early still leaves the reporter inactive; the signalled
    /// worker finishes on its own.
    pub async fn stop(&mut self) {
        self.ctx.shared.lock().unwrap().session = None;

        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if let Err(e) = worker.join.await {
                log::error!("Reporter worker failed: {}", e);
            }
            log::info!("Tracking stopped");
        }
    }

    /// Persists the new cadence. When active the timer is re-armed so the
    /// next send happens `seconds` from now.
    pub fn set_interval(&mut self, seconds: u64) -> Result<(), ReporterError> {
        if !is_valid_interval(seconds) {
            return Err(ReporterError::InvalidInterval(seconds));
        }

        let requested_at = Instant::now();
        self.ctx.shared.lock().unwrap().counters.interval_seconds = seconds;
        self.ctx.flush(StoreKey::TrackingInterval);

        if let Some(worker) = &self.worker {
            let _ = worker.rearm_tx.send(Rearm {
                period: Duration::from_secs(seconds),
                from: requested_at,
            });
        }

        log::info!("Reporting interval set to {}s", seconds);
        Ok(())
    }
}

fn arm(ctx: &Context, rearm: Rearm) -> Interval {
    let mut ticker = interval_at(rearm.from + rearm.period, rearm.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ctx.schedule_next_send(rearm.period);
    ticker
}

async fn run_reporter_loop(
    ctx: Arc<Context>,
    mut subscription: Subscription,
    initial: Rearm,
    mut stop_rx: oneshot::Receiver<()>,
    mut rearm_rx: mpsc::UnboundedReceiver<Rearm>,
) {
    let mut ticker = arm(&ctx, initial);
    let mut sends = JoinSet::new();
    let mut subscribed = true;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            Some(rearm) = rearm_rx.recv() => {
                ticker = arm(&ctx, rearm);
            }
            event = subscription.next(), if subscribed => match event {
                Some(Ok(sample)) => ctx.on_location_update(sample),
                Some(Err(err)) => ctx.on_location_error(&err),
                None => {
                    log::warn!("Location subscription closed by source");
                    subscribed = false;
                }
            },
            _ = ticker.tick() => ctx.on_send_tick(&mut sends),
            Some(joined) = sends.join_next(), if !sends.is_empty() => {
                if let Err(e) = joined {
                    log::error!("Send task failed: {}", e);
                }
            }
        }
    }

    subscription.cancel();
    sends.shutdown().await;
}
