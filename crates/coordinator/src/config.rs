//! Transition timing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for a single wait, in milliseconds
const MAX_WAIT_MS: u64 = 60_000;

/// Poll loop bounds for the reset-and-confirm cycle
///
/// Each phase waits at most `attempts × wait`. The defaults (21 × 500 ms)
/// add up to 10.5 s per phase, above the re-enumeration latency seen on
/// Android hosts after an accessory switch.
///
/// # Example Configuration
/// ```toml
/// [timing]
/// detach_attempts = 21
/// detach_wait_ms = 500
/// attach_attempts = 21
/// attach_wait_ms = 500
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTiming {
    /// Iterations while waiting for the device to leave the bus
    #[serde(default = "TransitionTiming::default_attempts")]
    pub detach_attempts: u32,
    /// Wait per detach iteration, in milliseconds
    #[serde(default = "TransitionTiming::default_wait_ms")]
    pub detach_wait_ms: u64,
    /// Iterations while waiting for the device to come back
    #[serde(default = "TransitionTiming::default_attempts")]
    pub attach_attempts: u32,
    /// Wait per attach iteration, in milliseconds
    #[serde(default = "TransitionTiming::default_wait_ms")]
    pub attach_wait_ms: u64,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            detach_attempts: Self::default_attempts(),
            detach_wait_ms: Self::default_wait_ms(),
            attach_attempts: Self::default_attempts(),
            attach_wait_ms: Self::default_wait_ms(),
        }
    }
}

impl TransitionTiming {
    fn default_attempts() -> u32 {
        21
    }

    fn default_wait_ms() -> u64 {
        500
    }

    /// Same number of attempts and wait for both phases
    pub fn uniform(attempts: u32, wait: Duration) -> Self {
        let wait_ms = wait.as_millis() as u64;
        Self {
            detach_attempts: attempts,
            detach_wait_ms: wait_ms,
            attach_attempts: attempts,
            attach_wait_ms: wait_ms,
        }
    }

    pub fn detach_wait(&self) -> Duration {
        Duration::from_millis(self.detach_wait_ms)
    }

    pub fn attach_wait(&self) -> Duration {
        Duration::from_millis(self.attach_wait_ms)
    }

    /// Longest time the detach phase can block
    pub fn detach_budget(&self) -> Duration {
        self.detach_wait() * self.detach_attempts
    }

    /// Longest time the attach phase can block
    pub fn attach_budget(&self) -> Duration {
        self.attach_wait() * self.attach_attempts
    }

    /// Validate configuration values
    pub fn validate(&self) -> common::Result<()> {
        if self.detach_attempts == 0 || self.attach_attempts == 0 {
            return Err(common::Error::Config(
                "detach_attempts and attach_attempts must be at least 1".to_string(),
            ));
        }

        for (name, wait) in [
            ("detach_wait_ms", self.detach_wait_ms),
            ("attach_wait_ms", self.attach_wait_ms),
        ] {
            if wait == 0 || wait > MAX_WAIT_MS {
                return Err(common::Error::Config(format!(
                    "Invalid {} {}, must be between 1 and {}",
                    name, wait, MAX_WAIT_MS
                )));
            }
        }

        Ok(())
    }
}
