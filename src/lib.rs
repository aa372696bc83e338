pub mod accounts;
pub mod alerts;
pub mod api;
pub mod appointment;
pub mod authorization;
pub mod config;
pub mod core_state;
pub mod dashboard;
pub mod db;
pub mod models;
pub mod notifications;
pub mod records;
pub mod tasks;
pub mod validation;
pub mod vitals;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `filter`, and
/// `filter` over the built-in default.
pub fn init_tracing(filter: Option<&str>) {
    let fallback = filter.unwrap_or(config::default_log_filter()).to_string();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .try_init();
}
