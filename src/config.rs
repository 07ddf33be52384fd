use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;
use crate::error::StreamError;

/// Default root for the live stream and recovery endpoints.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Client configuration.
///
/// Deserializes from the flat option keys used by the task executor's web
/// clients (`reconnectDelay`, `gapDetection`, ...). Snake-case spellings are
/// accepted as aliases. Delays are expressed in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamConfig {
    /// Resume point for the first connection; events with `seq <= since_seq`
    /// are considered already seen.
    #[serde(rename = "since_seq", alias = "sinceSeq")]
    pub since_seq: u64,
    /// Requested server-side delivery batch size.
    #[serde(rename = "batch_size", alias = "batchSize")]
    pub batch_size: u32,
    /// Requested server-side flush interval.
    #[serde(rename = "flush_interval", alias = "flushInterval", with = "duration_ms")]
    pub flush_interval: Duration,
    #[serde(alias = "reconnect_delay", with = "duration_ms")]
    pub reconnect_delay: Duration,
    #[serde(alias = "max_reconnect_delay", with = "duration_ms")]
    pub max_reconnect_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(alias = "reconnect_backoff")]
    pub reconnect_backoff: f64,
    #[serde(alias = "max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(alias = "auto_reconnect")]
    pub auto_reconnect: bool,
    #[serde(alias = "gap_detection")]
    pub gap_detection: bool,
    #[serde(alias = "base_url")]
    pub base_url: String,
    /// Page size used by gap recovery queries.
    #[serde(alias = "recovery_page_size")]
    pub recovery_page_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            since_seq: 0,
            batch_size: 50,
            flush_interval: Duration::from_millis(100),
            reconnect_delay: Duration::from_millis(1000),
            max_reconnect_delay: Duration::from_millis(30_000),
            reconnect_backoff: 1.5,
            max_reconnect_attempts: 10,
            auto_reconnect: true,
            gap_detection: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            recovery_page_size: 500,
        }
    }
}

impl StreamConfig {
    #[must_use]
    pub fn with_since_seq(mut self, since_seq: u64) -> Self {
        self.since_seq = since_seq;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_delay(mut self, max_reconnect_delay: Duration) -> Self {
        self.max_reconnect_delay = max_reconnect_delay;
        self
    }

    #[must_use]
    pub fn with_reconnect_backoff(mut self, multiplier: f64) -> Self {
        self.reconnect_backoff = multiplier;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    #[must_use]
    pub fn with_gap_detection(mut self, enabled: bool) -> Self {
        self.gap_detection = enabled;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_recovery_page_size(mut self, page_size: u32) -> Self {
        self.recovery_page_size = page_size;
        self
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.reconnect_delay,
            self.max_reconnect_delay,
            self.reconnect_backoff,
        )
    }

    /// Reject option combinations the client cannot run with.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.batch_size == 0 {
            return Err(StreamError::InvalidConfig(
                "batch_size must be greater than zero".to_owned(),
            ));
        }
        if self.recovery_page_size == 0 {
            return Err(StreamError::InvalidConfig(
                "recoveryPageSize must be greater than zero".to_owned(),
            ));
        }
        if !self.reconnect_backoff.is_finite() || self.reconnect_backoff < 1.0 {
            return Err(StreamError::InvalidConfig(format!(
                "reconnectBackoff must be a finite multiplier >= 1, got {}",
                self.reconnect_backoff
            )));
        }
        if self.max_reconnect_delay < self.reconnect_delay {
            return Err(StreamError::InvalidConfig(format!(
                "maxReconnectDelay ({}ms) is shorter than reconnectDelay ({}ms)",
                self.max_reconnect_delay.as_millis(),
                self.reconnect_delay.as_millis()
            )));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
