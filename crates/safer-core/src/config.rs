//! Monitor timing and supervision configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing budget of one cycle plus the supervisor's fault policy.
///
/// Passed into the supervisor at construction; nothing in the core reads
/// process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Sensor settling time between arm and hold, in seconds.
    pub settle_secs: u64,

    /// Interval between link polls while awaiting a reading, in seconds.
    pub poll_interval_secs: u64,

    /// Maximum number of polls per cycle.
    pub max_polls: u32,

    /// Wall-clock budget for awaiting a reading, in seconds.
    pub read_budget_secs: u64,

    /// Timeout imposed on each classifier call, in seconds.
    pub classify_timeout_secs: u64,

    /// Timeout imposed on speech playback, in seconds.
    pub speech_timeout_secs: u64,

    /// Delay before the next cycle after a fault, in seconds.
    pub fault_cooldown_secs: u64,

    /// Consecutive faults before the supervisor reopens the link (0 = never).
    pub reconnect_after_faults: u32,

    /// Emit a metrics snapshot every N cycles (0 = only at shutdown).
    pub metrics_flush_every: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            settle_secs: 20,
            poll_interval_secs: 1,
            max_polls: 60,
            read_budget_secs: 90,
            classify_timeout_secs: 60,
            speech_timeout_secs: 45,
            fault_cooldown_secs: 10,
            reconnect_after_faults: 3,
            metrics_flush_every: 10,
        }
    }
}

impl MonitorConfig {
    /// Reject values that would stall or spin the loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("poll_interval_secs", self.poll_interval_secs),
            ("max_polls", u64::from(self.max_polls)),
            ("read_budget_secs", self.read_budget_secs),
            ("classify_timeout_secs", self.classify_timeout_secs),
            ("speech_timeout_secs", self.speech_timeout_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn read_budget(&self) -> Duration {
        Duration::from_secs(self.read_budget_secs)
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classify_timeout_secs)
    }

    pub fn speech_timeout(&self) -> Duration {
        Duration::from_secs(self.speech_timeout_secs)
    }

    pub fn fault_cooldown(&self) -> Duration {
        Duration::from_secs(self.fault_cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.settle(), Duration::from_secs(20));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let config = MonitorConfig {
            poll_interval_secs: 0,
            ..MonitorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "poll_interval_secs"
            })
        );
    }

    #[test]
    fn zero_settle_and_cooldown_allowed() {
        let config = MonitorConfig {
            settle_secs: 0,
            fault_cooldown_secs: 0,
            reconnect_after_faults: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeouts_rejected() {
        let config = MonitorConfig {
            classify_timeout_secs: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = MonitorConfig {
            max_polls: 0,
            ..MonitorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero { field: "max_polls" })
        );
    }
}
