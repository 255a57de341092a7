use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub interface: Option<String>,
    pub refresh_interval: Duration,
    pub query_window: Duration,
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        if self.query_window >= self.refresh_interval {
            return Err(ConfigError::QueryWindowTooLong {
                query_window: self.query_window,
                refresh_interval: self.refresh_interval,
            });
        }
        Ok(())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Refresh interval must be longer than zero")]
    ZeroRefreshInterval,

    #[error("Query window {query_window:?} must be shorter than the refresh interval {refresh_interval:?}")]
    QueryWindowTooLong {
        query_window: Duration,
        refresh_interval: Duration,
    },
}

/// Parses durations such as `500ms`, `30s`, `5m` or `1h`.
pub fn parse_duration(text: &str) -> Result<Duration, DurationParseError> {
    let text = text.trim();
    // "ms" must be checked before "m" and "s".
    let units: [(&str, fn(u64) -> Option<Duration>); 4] = [
        ("ms", |n| Some(Duration::from_millis(n))),
        ("s", |n| Some(Duration::from_secs(n))),
        ("m", |n| n.checked_mul(60).map(Duration::from_secs)),
        ("h", |n| n.checked_mul(60 * 60).map(Duration::from_secs)),
    ];
    let (number, to_duration) = units
        .into_iter()
        .find_map(|(suffix, to_duration)| {
            text.strip_suffix(suffix)
                .map(|number| (number, to_duration))
        })
        .ok_or_else(|| DurationParseError::MissingUnit(text.into()))?;
    let number: u64 = number
        .parse()
        .map_err(|_| DurationParseError::InvalidNumber(text.into()))?;
    to_duration(number).ok_or_else(|| DurationParseError::Overflow(text.into()))
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("Duration {0:?} must end with one of `ms`, `s`, `m` or `h`")]
    MissingUnit(String),

    #[error("Duration {0:?} does not start with a non-negative integer")]
    InvalidNumber(String),

    #[error("Duration {0:?} is too long")]
    Overflow(String),
}
