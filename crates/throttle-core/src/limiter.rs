use crate::bucket::Bucket;
use crate::config::{LimiterConfig, RateWindow};
use crate::error::{ConfigError, ThrottleError};
use crate::observer::{ResetEvent, SetupEvent, ThrottleEvent, ThrottleObserver, TracingObserver};
use crate::scheduler;
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct UsageWindow {
    used: u32,
    started: Instant,
    started_at: DateTime<Local>,
}

#[derive(Debug)]
pub(crate) struct Engine {
    pub(crate) name: Arc<str>,
    pub(crate) window: RateWindow,
    pub(crate) bucket: Arc<Bucket>,
    pub(crate) origin: Instant,
    usage: Mutex<UsageWindow>,
    observer: Arc<dyn ThrottleObserver>,
}

impl Engine {
    fn new(name: Arc<str>, window: RateWindow, observer: Arc<dyn ThrottleObserver>) -> Self {
        let origin = Instant::now();
        Self {
            name,
            window,
            bucket: Arc::new(Bucket::new(window.quota() as usize)),
            origin,
            usage: Mutex::new(UsageWindow {
                used: 0,
                started: origin,
                started_at: Local::now(),
            }),
            observer,
        }
    }

    fn lock_usage(&self) -> MutexGuard<'_, UsageWindow> {
        self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_times(
        &self,
        started: Instant,
        now: Instant,
        at: DateTime<Local>,
    ) -> (Option<DateTime<Local>>, Option<Duration>) {
        if !self.window.resets() {
            return (None, None);
        }
        let Some(end) = started.checked_add(self.window.window()) else {
            return (None, None);
        };
        let left = end.saturating_duration_since(now);
        let resets_at = chrono::Duration::from_std(left)
            .ok()
            .and_then(|d| at.checked_add_signed(d));
        (resets_at, Some(left))
    }

    fn record_use(&self) {
        let now = Instant::now();
        let at = Local::now();
        let (used, started) = {
            let mut usage = self.lock_usage();
            usage.used = usage.used.saturating_add(1);
            (usage.used, usage.started)
        };
        let (resets_at, time_remaining) = self.reset_times(started, now, at);
        self.observer.on_throttle(&ThrottleEvent {
            limiter: &self.name,
            at,
            quota: self.window.quota(),
            remaining: self.window.quota().saturating_sub(used),
            resets_at,
            time_remaining,
        });
    }

    pub(crate) fn restart_window(&self, drained: usize) {
        let at = Local::now();
        {
            let mut usage = self.lock_usage();
            usage.used = 0;
            usage.started = Instant::now();
            usage.started_at = at;
        }
        self.observer.on_reset(&ResetEvent {
            limiter: &self.name,
            at,
            quota: self.window.quota(),
            drained,
        });
    }

    fn usage(&self) -> Usage {
        let now = Instant::now();
        let at = Local::now();
        let (used, started, started_at) = {
            let usage = self.lock_usage();
            (usage.used, usage.started, usage.started_at)
        };
        let (resets_at, resets_in) = self.reset_times(started, now, at);
        Usage {
            quota: self.window.quota(),
            used,
            remaining: self.window.quota().saturating_sub(used),
            window_started_at: started_at,
            resets_at,
            resets_in,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub quota: u32,
    pub used: u32,
    pub remaining: u32,
    pub window_started_at: DateTime<Local>,
    pub resets_at: Option<DateTime<Local>>,
    pub resets_in: Option<Duration>,
}

/// Tokens taken through a handle are not counted in [`RateLimiter::usage`].
#[derive(Debug, Clone)]
pub struct ThrottleHandle {
    name: Arc<str>,
    bucket: Arc<Bucket>,
}

impl ThrottleHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn take(&self) -> Result<(), ThrottleError> {
        self.bucket.take().await
    }

    pub fn try_take(&self) -> bool {
        self.bucket.try_take()
    }

    pub fn available(&self) -> usize {
        self.bucket.occupancy()
    }

    pub fn same_source(&self, other: &ThrottleHandle) -> bool {
        Arc::ptr_eq(&self.bucket, &other.bucket)
    }
}

#[derive(Debug)]
pub struct LimiterBuilder {
    name: String,
    window: RateWindow,
    observer: Option<Arc<dyn ThrottleObserver>>,
    parent: Option<CancellationToken>,
}

impl LimiterBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ThrottleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn shutdown_on(mut self, parent: &CancellationToken) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn build(self) -> RateLimiter {
        let shutdown = match self.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        RateLimiter {
            name: Arc::from(self.name),
            window: self.window,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            shutdown,
            engine: OnceLock::new(),
        }
    }
}

/// Dormant until first used; setup spawns onto the current tokio runtime.
/// Dropping the limiter stops its background tasks.
#[derive(Debug)]
pub struct RateLimiter {
    name: Arc<str>,
    window: RateWindow,
    observer: Arc<dyn ThrottleObserver>,
    shutdown: CancellationToken,
    engine: OnceLock<Arc<Engine>>,
}

impl RateLimiter {
    pub fn new(quota: u32, rate: Duration) -> Result<Self, ConfigError> {
        Ok(Self::builder(RateWindow::new(quota, rate)?).build())
    }

    pub fn named(name: impl Into<String>, quota: u32, rate: Duration) -> Result<Self, ConfigError> {
        Ok(Self::builder(RateWindow::new(quota, rate)?).name(name).build())
    }

    pub fn from_config(config: &LimiterConfig) -> Result<Self, ConfigError> {
        Ok(Self::builder(config.rate_window()?)
            .name(config.name.clone())
            .build())
    }

    pub fn builder(window: RateWindow) -> LimiterBuilder {
        LimiterBuilder {
            name: String::new(),
            window,
            observer: None,
            parent: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate_window(&self) -> RateWindow {
        self.window
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn engine(&self) -> &Arc<Engine> {
        self.engine.get_or_init(|| self.start())
    }

    fn start(&self) -> Arc<Engine> {
        let engine = Arc::new(Engine::new(
            self.name.clone(),
            self.window,
            self.observer.clone(),
        ));
        if self.shutdown.is_cancelled() {
            engine.bucket.close();
            return engine;
        }
        tokio::spawn(scheduler::refill(engine.clone(), self.shutdown.clone()));
        if self.window.resets() {
            tokio::spawn(scheduler::reset(engine.clone(), self.shutdown.clone()));
        }
        self.observer.on_setup(&SetupEvent {
            limiter: &self.name,
            quota: self.window.quota(),
            rate: self.window.rate(),
            window: self.window.window(),
        });
        engine
    }

    /// Fails only with [`ThrottleError::Closed`] once the limiter is shut down.
    pub async fn throttle(&self) -> Result<(), ThrottleError> {
        let engine = self.engine();
        engine.bucket.take().await?;
        engine.record_use();
        Ok(())
    }

    pub async fn throttle_timeout(&self, timeout: Duration) -> Result<(), ThrottleError> {
        match tokio::time::timeout(timeout, self.throttle()).await {
            Ok(result) => result,
            Err(_) => Err(ThrottleError::TimedOut(timeout)),
        }
    }

    pub async fn throttle_cancellable(&self, cancel: &CancellationToken) -> Result<(), ThrottleError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ThrottleError::Cancelled),
            result = self.throttle() => result,
        }
    }

    pub fn throttle_handle(&self) -> ThrottleHandle {
        let engine = self.engine();
        ThrottleHandle {
            name: engine.name.clone(),
            bucket: engine.bucket.clone(),
        }
    }

    pub fn tokens_left(&self) -> usize {
        self.engine().bucket.occupancy()
    }

    pub fn usage(&self) -> Option<Usage> {
        self.engine.get().map(|engine| engine.usage())
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(engine) = self.engine.get() {
            engine.bucket.close();
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
