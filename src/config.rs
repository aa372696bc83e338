use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Application-level constants
pub const APP_NAME: &str = "Medora";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of every "recent N" slice on dashboards and the notification dropdown.
pub const RECENT_LIMIT: u32 = 5;
/// Default page size for list endpoints.
pub const PAGE_SIZE: u32 = 20;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

/// Prefix for environment overrides, e.g. `MEDORA_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "MEDORA";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medora=info,tower_http=warn"
}

/// Get the application data directory
/// ~/Medora/ on all platforms, falling back to the working directory
/// when no home directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the portal database.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("medora.db")
}

// ─── Layered settings ───

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub log: LogSettings,
}

#[derive(Debug, thiserror::Error)]
#[error("Configuration error: {0}")]
pub struct SettingsError(#[from] ::config::ConfigError);

impl Settings {
    /// Defaults, then the optional TOML file, then `MEDORA_*` variables.
    /// A missing file is not an error; a malformed one is.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let default_db = default_db_path();
        let mut builder = ::config::Config::builder()
            .set_default("server.host", DEFAULT_HOST)?
            .set_default("server.port", DEFAULT_PORT as i64)?
            .set_default("database.path", default_db.to_string_lossy().into_owned())?
            .set_default("log.filter", default_log_filter())?;

        let file = file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("medora.toml"));
        builder = builder.add_source(::config::File::from(file).required(false));

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
