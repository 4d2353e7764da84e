use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("quota must be greater than zero")]
    ZeroQuota,

    #[error("rate must be greater than zero")]
    ZeroRate,

    #[error("window overflows: quota {quota} * rate {rate:?}")]
    WindowOverflow { quota: u32, rate: Duration },

    #[error("duplicate limiter name: {0}")]
    DuplicateName(String),

    #[error("unknown limiter: {0}")]
    UnknownLimiter(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("rate limiter has been shut down")]
    Closed,

    #[error("timed out after {0:?} waiting for a token")]
    TimedOut(Duration),

    #[error("wait for a token was cancelled")]
    Cancelled,
}
