//! Configuration management for demodojo.
//!
//! Loads and saves the TOML configuration with cross-platform paths and
//! atomic writes. Missing keys fall back to defaults.

use crate::{
    AppError, AppResult,
    config::{CaptureConfig, ServerConfig, SessionConfig},
};

use std::{
    fs,
    io::Write,
    net::SocketAddr,
    panic::Location,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Embedded server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Capture Host settings.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Session coordination settings.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from disk, creating a default one if none exists.
    #[track_caller]
    #[instrument]
    pub fn load() -> AppResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let config = Self::load_from(&config_path)?;
            info!(config_path = ?config_path, "Configuration loaded");
            Ok(config)
        } else {
            info!("No config found, creating default");
            Self::create_default()
        }
    }

    /// Parse the configuration at `path`.
    #[track_caller]
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to read config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        toml::from_str(&contents).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Save configuration to the platform config directory.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn save(&self) -> AppResult<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to `path` using the temp-file-then-rename pattern.
    #[track_caller]
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let temp_path = path.with_extension("toml.tmp");

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to create temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| AppError::ConfigError {
                reason: format!("Failed to write temp config file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        temp_file.sync_all().map_err(|e| AppError::ConfigError {
            reason: format!("Failed to sync temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        fs::rename(&temp_path, path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to rename temp config to final: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(config_path = ?path, "Configuration saved (atomic write)");

        Ok(())
    }

    /// Reject settings the runtime cannot use.
    #[track_caller]
    pub fn validate(&self) -> AppResult<()> {
        let zero = [
            ("capture.chunk_interval_ms", self.capture.chunk_interval_ms == 0),
            ("capture.chunk_bytes", self.capture.chunk_bytes == 0),
            ("session.stall_timeout_secs", self.session.stall_timeout_secs == 0),
            ("session.host_timeout_secs", self.session.host_timeout_secs == 0),
            ("session.watchdog_interval_secs", self.session.watchdog_interval_secs == 0),
        ];

        if let Some((key, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(AppError::ConfigError {
                reason: format!("{} must be greater than zero", key),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }

    /// Address the server listens on.
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind, self.server.port)
    }

    /// WebSocket URL surfaces connect to.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.server_addr())
    }

    #[track_caller]
    fn project_dirs() -> AppResult<ProjectDirs> {
        ProjectDirs::from("com", "demodojo", "DemoDojo").ok_or_else(|| AppError::ConfigError {
            reason: "Failed to get project directories".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    #[track_caller]
    fn config_path() -> AppResult<PathBuf> {
        let proj_dirs = Self::project_dirs()?;
        let config_dir = proj_dirs.config_dir();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            debug!(config_dir = ?config_dir, "Created config directory");
        }

        Ok(config_dir.join("config.toml"))
    }

    #[track_caller]
    fn create_default() -> AppResult<Self> {
        let proj_dirs = Self::project_dirs()?;
        let data_dir = proj_dirs.data_dir();

        let config = Config {
            server: ServerConfig::default(),
            capture: CaptureConfig {
                output_dir: data_dir.join("recordings"),
                ..CaptureConfig::default()
            },
            session: SessionConfig {
                store_path: data_dir.join("session.json"),
                ..SessionConfig::default()
            },
        };

        config.save()?;

        info!(
            output_dir = ?config.capture.output_dir,
            store_path = ?config.session.store_path,
            "Default config created"
        );

        Ok(config)
    }
}
