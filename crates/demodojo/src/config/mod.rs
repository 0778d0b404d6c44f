mod capture_config;
#[allow(clippy::module_inception)]
mod config;
mod server_config;
mod session_config;

pub(crate) use {
    capture_config::CaptureConfig, config::Config, server_config::ServerConfig,
    session_config::SessionConfig,
};

use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
};

pub(crate) const DEFAULT_PORT: u16 = 7979;
pub(crate) const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub(crate) const DEFAULT_CHUNK_INTERVAL_MS: u64 = 1_000;
pub(crate) const DEFAULT_CHUNK_BYTES: usize = 4_096;
pub(crate) const DEFAULT_COUNTDOWN_SECS: u32 = 3;
pub(crate) const DEFAULT_STALL_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_HOST_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 2;

pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn default_bind() -> IpAddr {
    DEFAULT_BIND
}

pub(crate) fn default_chunk_interval_ms() -> u64 {
    DEFAULT_CHUNK_INTERVAL_MS
}

pub(crate) fn default_chunk_bytes() -> usize {
    DEFAULT_CHUNK_BYTES
}

pub(crate) fn default_countdown_secs() -> u32 {
    DEFAULT_COUNTDOWN_SECS
}

pub(crate) fn default_stall_timeout_secs() -> u64 {
    DEFAULT_STALL_TIMEOUT_SECS
}

pub(crate) fn default_host_timeout_secs() -> u64 {
    DEFAULT_HOST_TIMEOUT_SECS
}

pub(crate) fn default_watchdog_interval_secs() -> u64 {
    DEFAULT_WATCHDOG_INTERVAL_SECS
}

// Relative fallbacks; `Config::create_default` fills in platform data dirs.
pub(crate) fn default_output_dir() -> PathBuf {
    PathBuf::from("recordings")
}

pub(crate) fn default_store_path() -> PathBuf {
    PathBuf::from("session.json")
}
