// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;

const fn default_threads() -> usize {
    3
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_public_root() -> PathBuf {
    PathBuf::from("public")
}

/// Listener-facing server configuration.
///
/// Plain HTTP needs `port`; with `tls = true` the `tls_port`, `fullchain`
/// and `pkey` settings are required instead.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ServerConfig {
    /// Serve TLS instead of plain HTTP.
    #[serde(default)]
    pub tls: bool,
    /// Port for plain HTTP (required when `tls = false`).
    pub port: Option<u16>,
    /// Port for TLS (required when `tls = true`).
    pub tls_port: Option<u16>,
    /// Path to the certificate chain PEM file.
    #[serde(default)]
    pub fullchain: String,
    /// Path to the private key PEM file.
    #[serde(default)]
    pub pkey: String,
    /// Address to bind on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Broadcast worker count.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Root directory for static files and the listen page.
    #[serde(default = "default_public_root")]
    pub public_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tls: false,
            port: None,
            tls_port: None,
            fullchain: String::new(),
            pkey: String::new(),
            bind: default_bind(),
            threads: default_threads(),
            public_root: default_public_root(),
        }
    }
}

/// One radio station: a display name and a directory of `*.opus` tracks.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct StationConfig {
    pub name: String,
    pub dir: PathBuf,
}

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Format for file logs.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

const fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/airwave.log".to_string()
}

/// Logging configuration (console and optional file output).
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LogConfig {
    #[serde(default = "default_true")]
    pub console_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default = "default_log_path")]
    pub file_path: String,
    #[serde(default)]
    pub file_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enable: true,
            console_level: LogLevel::default(),
            file_enable: false,
            file_level: LogLevel::default(),
            file_path: default_log_path(),
            file_format: LogFormat::default(),
        }
    }
}

/// Top-level Airwave configuration.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stations: Vec<StationConfig>,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Checks the invariants the server cannot start without.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first violated rule.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.tls {
            if self.server.fullchain.is_empty()
                || self.server.pkey.is_empty()
                || self.server.tls_port.is_none()
            {
                return Err(
                    "TLS is enabled: provide the fullchain, pkey and tls_port settings".to_string()
                );
            }
        } else if self.server.port.is_none() {
            return Err("provide the port setting (or enable TLS)".to_string());
        }

        if self.stations.is_empty() {
            return Err("configure at least one [[stations]] entry".to_string());
        }
        for station in &self.stations {
            if station.name.trim().is_empty() {
                return Err(format!(
                    "station with directory {} has an empty name",
                    station.dir.display()
                ));
            }
        }
        Ok(())
    }

    /// The port the server actually listens on.
    pub fn listen_port(&self) -> u16 {
        if self.server.tls {
            self.server.tls_port.unwrap_or(443)
        } else {
            self.server.port.unwrap_or(80)
        }
    }
}

/// Result of loading the configuration.
pub struct ConfigLoadResult {
    pub config: Config,
    /// Set when the config file was absent and defaults were used.
    pub file_missing: Option<String>,
}

/// Loads configuration from defaults, the TOML file and `AIRWAVE_`
/// environment overrides, in that order.
///
/// # Errors
///
/// Returns an error if the file or environment contain invalid values.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment =
        Figment::new().merge(figment::providers::Serialized::defaults(Config::default()));

    let mut file_missing = None;

    // Try to load the config file, but don't fail if it doesn't exist
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed("AIRWAVE_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Renders an example configuration for `airwave config default`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    let example = Config {
        server: ServerConfig { port: Some(8080), ..ServerConfig::default() },
        stations: vec![StationConfig {
            name: "Main Station".to_string(),
            dir: PathBuf::from("audio/main"),
        }],
        log: LogConfig::default(),
    };
    toml::to_string(&example)
}
