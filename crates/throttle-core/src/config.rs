use crate::error::ConfigError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Validated quota, refill rate and reset window of one limiter. Only
/// obtainable through the checked constructors:
///
/// ```compile_fail
/// use std::time::Duration;
/// let window = throttle_core::RateWindow {
///     quota: 0,
///     rate: Duration::ZERO,
///     window: Duration::ZERO,
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    quota: u32,
    rate: Duration,
    window: Duration,
}

impl RateWindow {
    /// Window defaults to `quota * rate`.
    pub fn new(quota: u32, rate: Duration) -> Result<Self, ConfigError> {
        check(quota, rate)?;
        let window = rate
            .checked_mul(quota)
            .ok_or(ConfigError::WindowOverflow { quota, rate })?;
        Ok(Self {
            quota,
            rate,
            window,
        })
    }

    /// `Duration::ZERO` disables the periodic reset.
    pub fn windowed(quota: u32, rate: Duration, window: Duration) -> Result<Self, ConfigError> {
        check(quota, rate)?;
        Ok(Self {
            quota,
            rate,
            window,
        })
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn quota(&self) -> u32 {
        self.quota
    }

    pub fn rate(&self) -> Duration {
        self.rate
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn resets(&self) -> bool {
        !self.window.is_zero()
    }
}

fn check(quota: u32, rate: Duration) -> Result<(), ConfigError> {
    if quota == 0 {
        return Err(ConfigError::ZeroQuota);
    }
    if rate.is_zero() {
        return Err(ConfigError::ZeroRate);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimiterConfig {
    #[serde(default)]
    pub name: String,
    pub quota: u32,
    pub rate_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,
}

impl LimiterConfig {
    pub fn rate_window(&self) -> Result<RateWindow, ConfigError> {
        let rate = Duration::from_millis(self.rate_ms);
        match self.window_ms {
            Some(ms) => RateWindow::windowed(self.quota, rate, Duration::from_millis(ms)),
            None => RateWindow::new(self.quota, rate),
        }
    }
}

/// A TOML file with one `[[limiter]]` table per limiter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitersFile {
    #[serde(default, rename = "limiter")]
    pub limiters: Vec<LimiterConfig>,
}

impl LimitersFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).context("read limiter config")?;
        Self::parse(&raw).with_context(|| format!("parse {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let parsed = toml::from_str::<LimitersFile>(raw)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Checks every entry and rejects repeated names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for limiter in &self.limiters {
            limiter.rate_window()?;
            if !seen.insert(limiter.name.as_str()) {
                return Err(ConfigError::DuplicateName(limiter.name.clone()));
            }
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Result<&LimiterConfig, ConfigError> {
        self.limiters
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| ConfigError::UnknownLimiter(name.to_string()))
    }
}
