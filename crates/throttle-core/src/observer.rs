use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SetupEvent<'a> {
    pub limiter: &'a str,
    pub quota: u32,
    pub rate: Duration,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct ThrottleEvent<'a> {
    pub limiter: &'a str,
    pub at: DateTime<Local>,
    pub quota: u32,
    pub remaining: u32,
    /// `None` when the limiter never resets.
    pub resets_at: Option<DateTime<Local>>,
    pub time_remaining: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ResetEvent<'a> {
    pub limiter: &'a str,
    pub at: DateTime<Local>,
    pub quota: u32,
    pub drained: usize,
}

/// Receives diagnostic facts from a limiter. All hooks are no-ops by default.
///
/// Hooks run inline on the throttling task or the reset task, so they should
/// return quickly.
pub trait ThrottleObserver: Send + Sync + fmt::Debug {
    fn on_setup(&self, _event: &SetupEvent<'_>) {}
    fn on_throttle(&self, _event: &ThrottleEvent<'_>) {}
    fn on_reset(&self, _event: &ResetEvent<'_>) {}
}

/// Emits every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ThrottleObserver for TracingObserver {
    fn on_setup(&self, event: &SetupEvent<'_>) {
        info!(
            limiter = %event.limiter,
            quota = event.quota,
            rate = ?event.rate,
            window = ?event.window,
            "rate limiter started"
        );
    }

    fn on_throttle(&self, event: &ThrottleEvent<'_>) {
        debug!(
            limiter = %event.limiter,
            at = %event.at,
            quota = event.quota,
            remaining = event.remaining,
            resets_at = ?event.resets_at,
            time_remaining = ?event.time_remaining,
            "throttling"
        );
    }

    fn on_reset(&self, event: &ResetEvent<'_>) {
        debug!(
            limiter = %event.limiter,
            at = %event.at,
            quota = event.quota,
            drained = event.drained,
            "resetting rate limiter"
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ThrottleObserver for NoopObserver {}
