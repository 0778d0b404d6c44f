use chrono::Duration;

/// Fallback countdown when START does not name one.
pub(crate) const DEFAULT_COUNTDOWN_SECS: u32 = 3;
/// Recording with no chunk for this long is considered stalled.
pub(crate) const DEFAULT_STALL_TIMEOUT_SECS: i64 = 10;
/// Requesting or Finalizing with no host answer for this long is abandoned.
pub(crate) const DEFAULT_HOST_TIMEOUT_SECS: i64 = 30;
/// Compare-and-set attempts after the first before giving up.
pub(crate) const DEFAULT_MAX_STORE_RETRIES: u32 = 3;

/// Tunables for [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Countdown used when START omits `countdownSeconds`.
    pub default_countdown_secs: u32,
    /// Silence after which WATCHDOG fails a recording.
    pub stall_timeout: Duration,
    /// Wait for the Capture Host to grant a source or finalize before
    /// WATCHDOG fails the session with `ContextLost`.
    pub host_timeout: Duration,
    /// Retries on a lost compare-and-set race.
    pub max_store_retries: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            default_countdown_secs: DEFAULT_COUNTDOWN_SECS,
            stall_timeout: Duration::seconds(DEFAULT_STALL_TIMEOUT_SECS),
            host_timeout: Duration::seconds(DEFAULT_HOST_TIMEOUT_SECS),
            max_store_retries: DEFAULT_MAX_STORE_RETRIES,
        }
    }
}
