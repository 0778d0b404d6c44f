//! DemoDojo: recording session coordinator for a tab and screen recorder.

mod app;
mod capture_worker;
mod config;
mod error;
mod inbound;
mod router;
mod server;
#[cfg(test)]
mod tests;

pub(crate) use {
    app::App,
    capture_worker::CaptureWorker,
    error::{AppError, Result as AppResult},
    inbound::Inbound,
    router::MessageRouter,
    server::ServerState,
};

use crate::config::Config;

use tracing::error;
use tracing_subscriber::EnvFilter;

/// Application entry point.
fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("demodojo=debug,demodojo_core=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        error!("Invalid config: {:?}", e);
        std::process::exit(1);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(App { config }.run()) {
        error!(error = ?e, "App error");
        std::process::exit(1);
    }
}
