//! dockcast - a floating application dock with ad-hoc screen recording.
//!
//! The library holds the window registry, the capture pipeline and the AVI
//! writer; the binary wires them to a line console on stdin/stdout.

pub mod app;
pub mod capture;
pub mod commands;
pub mod config;
pub mod container;
pub mod recorder;
pub mod registry;
pub mod utils;

#[cfg(test)]
mod testing;

use commands::AppState;
use config::DockConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::AppResult;

/// Install the tracing subscriber. Logs go to stderr so stdout stays JSON.
///
/// `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the dock until the console closes
pub async fn run(config: DockConfig) -> AppResult<()> {
    config.validate()?;
    tracing::info!("Starting dockcast v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::platform(config);
    app::run(state).await
}
