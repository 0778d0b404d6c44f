use crate::config::{
    default_countdown_secs, default_host_timeout_secs, default_stall_timeout_secs,
    default_store_path, default_watchdog_interval_secs,
};

use std::{path::PathBuf, time::Duration};

use demodojo_core::CoordinatorSettings;
use serde::{Deserialize, Serialize};

/// Session coordination configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session record file.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Countdown when START does not specify one.
    #[serde(default = "default_countdown_secs")]
    pub default_countdown_secs: u32,
    /// Seconds without a chunk before a recording counts as stalled.
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
    /// Seconds to wait for the Capture Host to grant or finalize.
    #[serde(default = "default_host_timeout_secs")]
    pub host_timeout_secs: u64,
    /// How often the watchdog checks for stalls.
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,
}

impl SessionConfig {
    /// Coordinator tunables derived from this section.
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            default_countdown_secs: self.default_countdown_secs,
            stall_timeout: seconds(self.stall_timeout_secs),
            host_timeout: seconds(self.host_timeout_secs),
            ..CoordinatorSettings::default()
        }
    }

    /// Watchdog period. Never zero.
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            default_countdown_secs: default_countdown_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
            host_timeout_secs: default_host_timeout_secs(),
            watchdog_interval_secs: default_watchdog_interval_secs(),
        }
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
