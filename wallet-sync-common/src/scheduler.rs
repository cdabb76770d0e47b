//! Periodic job runner with a status broadcast protocol
//!
//! A [`SchedulerTimer`] runs one job at a time for the active identity and
//! reports its progress on the [`MessageBus`] under the tag
//! `<name>Status` with `data.state` set to `in_progress`, `idle` or `error`.
//!
//! A job that returns an error halts the schedule: the timer is not armed
//! (or is torn down when the failure happens on a recurring tick) until the
//! caller invokes [`SchedulerTimer::start`] again. Jobs that must survive
//! transient failures handle them internally and return `Ok`.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wallet_sync_common::events::MessageBus;
//! use wallet_sync_common::scheduler::{FnJob, Job, JobContext, SchedulerInterval, SchedulerTimer, StaticIdentity};
//! use wallet_sync_common::types::Identity;
//!
//! # async fn run() {
//! let bus = MessageBus::new();
//! let identity = Arc::new(StaticIdentity::new(Some(Identity::new("aaaaa-aa"))));
//! let scheduler = SchedulerTimer::new("refresh", bus.clone(), identity);
//!
//! let job: Arc<dyn Job<u32>> = Arc::new(FnJob(|ctx: JobContext<u32>| async move {
//!     ctx.post_msg("refreshed", serde_json::json!({ "value": ctx.data }));
//!     Ok::<(), anyhow::Error>(())
//! }));
//!
//! scheduler
//!     .start(SchedulerInterval::Every(Duration::from_secs(60)), job, 7u32)
//!     .await
//!     .ok();
//! scheduler.stop();
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{job_error, SyncResult};
use crate::events::{status_tag, MessageBus};
use crate::logging::{log_scheduler, LogLevel};
use crate::types::Identity;

/// Lifecycle state broadcast by a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    InProgress,
    Error,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::InProgress => "in_progress",
            SchedulerState::Error => "error",
        }
    }
}

/// How often a started job repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerInterval {
    Every(Duration),
    /// Run once on start and never again
    Disabled,
}

impl SchedulerInterval {
    /// Seconds to interval; zero disables the timer
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            SchedulerInterval::Disabled
        } else {
            SchedulerInterval::Every(Duration::from_secs(secs))
        }
    }
}

/// Resolves the identity a job runs for
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when nobody is signed in
    async fn identity(&self) -> Option<Identity>;
}

/// Identity provider whose identity is set by the host
#[derive(Debug, Default)]
pub struct StaticIdentity {
    identity: Mutex<Option<Identity>>,
}

impl StaticIdentity {
    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            identity: Mutex::new(identity),
        }
    }

    pub fn set(&self, identity: Option<Identity>) {
        *self
            .identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = identity;
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn identity(&self) -> Option<Identity> {
        self.identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Unit of work run by a scheduler
#[async_trait]
pub trait Job<D: Send + 'static>: Send + Sync {
    async fn run(&self, ctx: JobContext<D>) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`Job`]
pub struct FnJob<F>(pub F);

#[async_trait]
impl<D, F, Fut> Job<D> for FnJob<F>
where
    D: Send + 'static,
    F: Fn(JobContext<D>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: JobContext<D>) -> anyhow::Result<()> {
        (self.0)(ctx).await
    }
}

/// Arguments handed to a job invocation
pub struct JobContext<D> {
    pub identity: Identity,
    pub data: D,
    handle: SchedulerHandle,
}

impl<D> JobContext<D> {
    /// Publish a message, unless the owning scheduler is idle
    pub fn post_msg(&self, msg: &str, data: serde_json::Value) -> bool {
        self.handle.post_msg(msg, data)
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.handle
    }
}

enum RunOutcome {
    Completed,
    Failed(anyhow::Error),
    Skipped,
}

struct Shared {
    name: String,
    bus: MessageBus,
    identity: Arc<dyn IdentityProvider>,
    state: Mutex<SchedulerState>,
    in_flight: AtomicBool,
}

impl Shared {
    fn state(&self) -> SchedulerState {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SchedulerState) {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    fn broadcast(&self, state: SchedulerState) {
        self.set_state(state);
        self.bus
            .publish(&status_tag(&self.name), json!({ "state": state.as_str() }));
    }

    async fn resolve_identity(&self) -> Option<Identity> {
        let identity = self.identity.identity().await;
        if identity.is_none() {
            log_scheduler(
                LogLevel::Error,
                "No identity available, job not started",
                Some(json!({ "scheduler": self.name })),
            );
        }
        identity
    }

    async fn run_once<D: Send + 'static>(self: &Arc<Self>, identity: Identity, job: &dyn Job<D>, data: D) -> RunOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log_scheduler(
                LogLevel::Debug,
                "Job already in flight, skipping",
                Some(json!({ "scheduler": self.name })),
            );
            return RunOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.broadcast(SchedulerState::InProgress);

        let ctx = JobContext {
            identity,
            data,
            handle: SchedulerHandle {
                shared: Arc::clone(self),
            },
        };

        match job.run(ctx).await {
            Ok(()) => {
                self.broadcast(SchedulerState::Idle);
                RunOutcome::Completed
            }
            Err(err) => {
                log_scheduler(
                    LogLevel::Error,
                    "Job failed",
                    Some(json!({ "scheduler": self.name, "error": format!("{:#}", err) })),
                );
                self.broadcast(SchedulerState::Error);
                self.broadcast(SchedulerState::Idle);
                RunOutcome::Failed(err)
            }
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Cheap handle to a scheduler's state and message channel
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Publish a message while the scheduler is not idle
    ///
    /// Returns whether the message was published.
    pub fn post_msg(&self, msg: &str, data: serde_json::Value) -> bool {
        if self.shared.state() == SchedulerState::Idle {
            log_scheduler(
                LogLevel::Debug,
                "Message suppressed, scheduler idle",
                Some(json!({ "scheduler": self.shared.name, "msg": msg })),
            );
            return false;
        }
        self.shared.bus.publish(msg, data);
        true
    }
}

struct ArmedTimer {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Identity-gated, overlap-safe periodic job runner
pub struct SchedulerTimer {
    shared: Arc<Shared>,
    timer: Mutex<Option<ArmedTimer>>,
}

impl SchedulerTimer {
    pub fn new(name: impl Into<String>, bus: MessageBus, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                bus,
                identity,
                state: Mutex::new(SchedulerState::Idle),
                in_flight: AtomicBool::new(false),
            }),
            timer: Mutex::new(None),
        }
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<ArmedTimer>> {
        self.timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Whether a recurring timer is armed
    pub fn is_running(&self) -> bool {
        self.lock_timer()
            .as_ref()
            .map_or(false, |timer| !timer.handle.is_finished())
    }

    /// Run the job now and, if it succeeds, every `interval` afterwards
    ///
    /// A no-op while a timer is already armed. Without an identity nothing
    /// runs. If another run is still in flight the immediate run is skipped
    /// but the timer is armed all the same. An error from the immediate run
    /// is returned after it has been broadcast, and leaves the timer unarmed.
    pub async fn start<D>(&self, interval: SchedulerInterval, job: Arc<dyn Job<D>>, data: D) -> SyncResult<()>
    where
        D: Clone + Send + Sync + 'static,
    {
        if self.is_running() {
            log_scheduler(
                LogLevel::Debug,
                "Timer already armed",
                Some(json!({ "scheduler": self.shared.name })),
            );
            return Ok(());
        }

        let Some(identity) = self.shared.resolve_identity().await else {
            return Ok(());
        };

        if let RunOutcome::Failed(err) = self.shared.run_once(identity, job.as_ref(), data.clone()).await {
            return Err(job_error(self.shared.name.clone(), err));
        }

        if let SchedulerInterval::Every(period) = interval {
            self.arm(period, job, data);
        }
        Ok(())
    }

    /// Run the job exactly once, without arming a timer
    pub async fn trigger<D>(&self, job: Arc<dyn Job<D>>, data: D) -> SyncResult<()>
    where
        D: Send + 'static,
    {
        let Some(identity) = self.shared.resolve_identity().await else {
            return Ok(());
        };

        match self.shared.run_once(identity, job.as_ref(), data).await {
            RunOutcome::Failed(err) => Err(job_error(self.shared.name.clone(), err)),
            RunOutcome::Completed | RunOutcome::Skipped => Ok(()),
        }
    }

    /// Disarm the timer and broadcast `idle`
    ///
    /// A job already running is left to finish; no tick fires after it.
    pub fn stop(&self) {
        if let Some(timer) = self.lock_timer().take() {
            let _ = timer.cancel.send(true);
            log_scheduler(
                LogLevel::Info,
                "Timer cleared",
                Some(json!({ "scheduler": self.shared.name })),
            );
        }
        self.shared.broadcast(SchedulerState::Idle);
    }

    fn arm<D>(&self, period: Duration, job: Arc<dyn Job<D>>, data: D)
    where
        D: Clone + Send + Sync + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);
        let shared = Arc::clone(&self.shared);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    // either stop() or the scheduler was dropped
                    _ = cancelled.changed() => break,
                    _ = ticker.tick() => {
                        if *cancelled.borrow() {
                            break;
                        }
                        let Some(identity) = shared.resolve_identity().await else {
                            continue;
                        };
                        if let RunOutcome::Failed(_) = shared.run_once(identity, job.as_ref(), data.clone()).await {
                            log_scheduler(
                                LogLevel::Warn,
                                "Timer halted after job failure",
                                Some(json!({ "scheduler": shared.name })),
                            );
                            break;
                        }
                    }
                }
            }
        });

        log_scheduler(
            LogLevel::Info,
            "Timer armed",
            Some(json!({ "scheduler": self.shared.name, "interval_ms": period.as_millis() as u64 })),
        );
        *self.lock_timer() = Some(ArmedTimer { cancel, handle });
    }
}

impl Drop for SchedulerTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.lock_timer().take() {
            let _ = timer.cancel.send(true);
        }
    }
}
