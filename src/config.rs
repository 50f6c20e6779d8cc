//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::ConfigError;
use crate::llm::RetryPolicy;

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Confidence below which the generative fallback is consulted.
    pub fallback_threshold: f32,
    /// Maximum cached responses before the oldest is evicted.
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    /// Per-attempt timeout for the generative model.
    pub generative_timeout: Duration,
    pub generative_attempts: u32,
    /// Backoff unit; attempt `n` waits `n * backoff`.
    pub generative_backoff: Duration,
    /// How far ahead interview slots are offered.
    pub slot_horizon_days: u32,
    /// Minimum gap between reminders for the same overdue escalation.
    pub reminder_interval: Duration,
    pub sweep_interval: Duration,
    /// Business timezone as a whole-hour UTC offset.
    pub business_utc_offset_hours: i32,
    /// Fixed seed for template variant selection. `None` seeds from entropy.
    pub template_seed: Option<u64>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            fallback_threshold: 0.7,
            cache_capacity: 1000,
            cache_ttl: Duration::from_secs(300), // 5 minutes
            generative_timeout: Duration::from_secs(8),
            generative_attempts: 2,
            generative_backoff: Duration::from_millis(500),
            slot_horizon_days: 14,
            reminder_interval: Duration::from_secs(900), // 15 minutes
            sweep_interval: Duration::from_secs(60),
            business_utc_offset_hours: 0,
            template_seed: None,
        }
    }
}

impl RouterConfig {
    /// Defaults overridden by `CHAT_ROUTER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let threshold: f32 = parse(&lookup, "CHAT_ROUTER_FALLBACK_THRESHOLD")?
            .unwrap_or(d.fallback_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidValue {
                key: "CHAT_ROUTER_FALLBACK_THRESHOLD".into(),
                message: format!("{threshold} is outside [0, 1]"),
            });
        }
        let offset: i32 = parse(&lookup, "CHAT_ROUTER_BUSINESS_UTC_OFFSET_HOURS")?
            .unwrap_or(d.business_utc_offset_hours);
        if !(-12..=14).contains(&offset) {
            return Err(ConfigError::InvalidValue {
                key: "CHAT_ROUTER_BUSINESS_UTC_OFFSET_HOURS".into(),
                message: format!("{offset} is not a valid UTC offset"),
            });
        }
        let attempts: u32 =
            parse(&lookup, "CHAT_ROUTER_GENERATIVE_ATTEMPTS")?.unwrap_or(d.generative_attempts);

        Ok(Self {
            fallback_threshold: threshold,
            cache_capacity: parse(&lookup, "CHAT_ROUTER_CACHE_CAPACITY")?
                .unwrap_or(d.cache_capacity),
            cache_ttl: parse(&lookup, "CHAT_ROUTER_CACHE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(d.cache_ttl),
            generative_timeout: nonzero_secs(&lookup, "CHAT_ROUTER_GENERATIVE_TIMEOUT_SECS")?
                .unwrap_or(d.generative_timeout),
            generative_attempts: attempts.max(1),
            generative_backoff: parse(&lookup, "CHAT_ROUTER_GENERATIVE_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(d.generative_backoff),
            slot_horizon_days: parse(&lookup, "CHAT_ROUTER_SLOT_HORIZON_DAYS")?
                .unwrap_or(d.slot_horizon_days),
            reminder_interval: nonzero_secs(&lookup, "CHAT_ROUTER_REMINDER_INTERVAL_SECS")?
                .unwrap_or(d.reminder_interval),
            sweep_interval: nonzero_secs(&lookup, "CHAT_ROUTER_SWEEP_INTERVAL_SECS")?
                .unwrap_or(d.sweep_interval),
            business_utc_offset_hours: offset,
            template_seed: parse(&lookup, "CHAT_ROUTER_TEMPLATE_SEED")?,
        })
    }

    pub fn business_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.business_utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.generative_attempts,
            timeout: self.generative_timeout,
            backoff: self.generative_backoff,
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

/// A whole number of seconds that must be at least one.
fn nonzero_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    match parse::<u64>(lookup, key)? {
        Some(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be at least 1 second".into(),
        }),
        secs => Ok(secs.map(Duration::from_secs)),
    }
}
