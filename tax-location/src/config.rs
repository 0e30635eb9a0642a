use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings for the location service.
///
/// Durations are written as whole milliseconds:
///
/// ```toml
/// base_url = "http://localhost:8085"
/// timeout_ms = 2000
/// fallback = "propagate"
///
/// [retry]
/// max_attempts = 3
/// initial_backoff_ms = 100
/// max_backoff_ms = 2000
/// multiplier = 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub base_url: String,

    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    pub retry: RetryPolicy,
    pub fallback: Fallback,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8085".to_string(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            fallback: Fallback::default(),
        }
    }
}

/// Exponential backoff between attempts: `min(initial * multiplier^n, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,

    #[serde(rename = "initial_backoff_ms", with = "millis")]
    pub initial_backoff: Duration,

    #[serde(rename = "max_backoff_ms", with = "millis")]
    pub max_backoff: Duration,

    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Millisecond backoff for tests.
    #[must_use]
    pub fn fast(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            multiplier: 2.0,
        }
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry number `retry` (0 = the first retry).
    pub fn backoff_for(
        &self,
        retry: u32,
    ) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * multiplier.powi(exponent);
        let max = self.max_backoff.as_secs_f64();

        if delay.is_finite() && delay < max {
            Duration::from_secs_f64(delay)
        } else {
            self.max_backoff
        }
    }
}

/// What a lookup yields once every attempt has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Log the last error and return it.
    #[default]
    Propagate,
    /// Answer with no names; callers drop the rows they cannot enrich.
    Empty,
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
