//! Backoff and error classification for node failures
//!
//! The relay loop never gives up on a pair because of a node hiccup: failed
//! cycles are retried after an exponential backoff. Raw node messages are
//! classified so that a rejected block range is told apart from a transient
//! RPC failure.

use std::time::Duration;

/// Cycle retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate backoff duration for a given attempt (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let backoff_secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

/// Classifies node errors
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorClass {
    /// Temporary failure (RPC timeout, network issues)
    Transient,
    /// The node refused the block range: too wide, too many results, or
    /// beyond what it has indexed
    RangeRejected,
    /// Retrying the same request cannot succeed
    Permanent,
    /// Unknown error
    Unknown,
}

/// Classify a node error message
pub fn classify_error(error: &str) -> ErrorClass {
    let error_lower = error.to_lowercase();

    // Range errors come first: several providers phrase them as "limit
    // exceeded", which would otherwise read as rate limiting.
    if error_lower.contains("block range")
        || error_lower.contains("range too large")
        || error_lower.contains("range is too large")
        || error_lower.contains("query returned more than")
        || error_lower.contains("too many blocks")
        || error_lower.contains("exceed maximum block range")
        || error_lower.contains("log response size exceeded")
        || error_lower.contains("header not found")
        || error_lower.contains("block not found")
        || error_lower.contains("unknown block")
        || error_lower.contains("invalid block range")
    {
        return ErrorClass::RangeRejected;
    }

    if error_lower.contains("timeout")
        || error_lower.contains("timed out")
        || error_lower.contains("connection")
        || error_lower.contains("network")
        || error_lower.contains("rate limit")
        || error_lower.contains("too many requests")
        || error_lower.contains("503")
        || error_lower.contains("502")
        || error_lower.contains("temporarily unavailable")
    {
        return ErrorClass::Transient;
    }

    if error_lower.contains("reverted")
        || error_lower.contains("invalid signature")
        || error_lower.contains("insufficient funds")
        || error_lower.contains("nonce too low")
        || error_lower.contains("already known")
        || error_lower.contains("underpriced")
        || error_lower.contains("invalid parameters")
    {
        return ErrorClass::Permanent;
    }

    ErrorClass::Unknown
}
