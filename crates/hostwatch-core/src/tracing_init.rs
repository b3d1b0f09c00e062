//! Shared tracing/logging initialization.
//!
//! The embedding application calls [`init_tracing`] once at startup so every
//! hostwatch component logs through the same env-filtered subscriber.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::MonitorConfig;

/// Initialise the global tracing subscriber.
///
/// The default filter scopes hostwatch crates to the configured level
/// (e.g. `hostwatch=info`); a set `RUST_LOG` env-var replaces it entirely.
/// With `log_json`, log lines are emitted as structured JSON instead of the
/// human-readable format.
pub fn init_tracing(config: &MonitorConfig, log_json: bool) {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("hostwatch={}", config.log_level));
    let env_filter = tracing_subscriber::EnvFilter::new(filter);
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
