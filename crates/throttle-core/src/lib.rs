pub mod bucket;
pub mod config;
pub mod error;
pub mod limiter;
pub mod observer;
mod scheduler;

pub use bucket::Bucket;
pub use config::{LimiterConfig, LimitersFile, RateWindow};
pub use error::{ConfigError, ThrottleError};
pub use limiter::{LimiterBuilder, RateLimiter, ThrottleHandle, Usage};
pub use observer::{NoopObserver, ResetEvent, SetupEvent, ThrottleEvent, ThrottleObserver, TracingObserver};
