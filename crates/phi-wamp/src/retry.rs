//! Reconnection policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::WampError;
use crate::Result;

/// Delays are in seconds, matching the console's settings panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Reconnect attempts after a drop before giving up
    pub max_retries: u32,
    pub initial_delay: f64,
    pub max_delay: f64,
    /// Multiplier applied to the delay after every attempt
    pub growth: f64,
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_delay > 0.0) {
            return Err(WampError::InvalidConfig(
                "initial retry delay must be positive".to_string(),
            ));
        }
        if !(self.max_delay >= self.initial_delay) {
            return Err(WampError::InvalidConfig(
                "max retry delay must be at least the initial delay".to_string(),
            ));
        }
        if !(self.growth > 1.0) {
            return Err(WampError::InvalidConfig(
                "retry delay growth must be greater than 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let seconds = (self.initial_delay * self.growth.powi(exponent)).min(self.max_delay);
        Duration::from_secs_f64(seconds)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 15,
            initial_delay: 5.0,
            max_delay: 10.0,
            growth: 1.1,
        }
    }
}
