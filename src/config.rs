//! Configuration module for netprobe.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::auth::Secret;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Which lifecycles this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Server,
    Client,
    Both,
}

impl Mode {
    pub fn runs_server(self) -> bool {
        matches!(self, Mode::Server | Mode::Both)
    }

    pub fn runs_client(self) -> bool {
        matches!(self, Mode::Client | Mode::Both)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "netprobe")]
#[command(author = "netprobe authors")]
#[command(version = "0.1.0")]
#[command(about = "Network reachability and latency probe", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run the echo server, the probing client, or both
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Address for the echo server to listen at (e.g., 0.0.0.0:5353)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Remote echo servers, e.g. '1.1.1.1:5353,2.2.2.2:5353'
    #[arg(short = 'r', long, value_delimiter = ',')]
    pub remotes: Vec<String>,

    /// Token for authenticating incoming connections (empty = no auth)
    #[arg(long)]
    pub server_token: Option<String>,

    /// Token the client authenticates with (empty = no auth)
    #[arg(long)]
    pub client_token: Option<String>,

    /// Interval between probes (e.g., 10s, 500ms)
    #[arg(short = 'i', long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Write logs to this file, rotated daily, instead of stdout
    #[arg(long)]
    pub log_path: Option<PathBuf>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    pub mode: Option<Mode>,
    pub workers: Option<usize>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Token required from clients
    pub token: Option<String>,
    /// Maximum concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            token: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Client-related configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub remotes: Vec<String>,
    pub token: Option<String>,
    #[serde(default = "default_interval", deserialize_with = "de_duration")]
    pub interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            remotes: Vec::new(),
            token: None,
            interval: default_interval(),
        }
    }
}

/// Lifecycle timing
#[derive(Debug, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_timeout", deserialize_with = "de_duration")]
    pub connect: Duration,
    #[serde(default = "default_handshake_timeout", deserialize_with = "de_duration")]
    pub handshake: Duration,
    #[serde(default = "default_retry_delay", deserialize_with = "de_duration")]
    pub retry_delay: Duration,
    #[serde(default = "default_accept_backoff", deserialize_with = "de_duration")]
    pub accept_backoff: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: default_connect_timeout(),
            handshake: default_handshake_timeout(),
            retry_delay: default_retry_delay(),
            accept_backoff: default_accept_backoff(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Log file; stdout when unset
    pub path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
            path: None,
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:5353".to_string()
}

fn default_max_connections() -> usize {
    10000
}

fn default_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_accept_backoff() -> Duration {
    Duration::from_millis(100)
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a duration such as `500ms`, `5s`, `2m` or `1h`. A bare number is
/// taken as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{input}'"))?;

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => Ok(Duration::from_secs(value)),
        "m" => scaled_secs(value, 60, input),
        "h" => scaled_secs(value, 3600, input),
        other => Err(format!("unknown duration unit '{other}' in '{input}'")),
    }
}

fn scaled_secs(value: u64, factor: u64, input: &str) -> Result<Duration, String> {
    value
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{input}' out of range"))
}

fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Settings consumed by the server lifecycle.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: String,
    pub secret: Option<Secret>,
    pub max_connections: usize,
    pub handshake_timeout: Duration,
    pub accept_backoff: Duration,
}

/// Settings consumed by each client lifecycle.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub remotes: Vec<String>,
    pub secret: Option<Secret>,
    pub interval: Duration,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub retry_delay: Duration,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub workers: Option<usize>,
    pub server: ServerSettings,
    pub client: ClientSettings,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let TomlConfig {
            mode,
            workers,
            server,
            client,
            timeouts,
            logging,
        } = toml_config;

        let remotes: Vec<String> = if cli.remotes.is_empty() {
            client.remotes
        } else {
            cli.remotes
        };

        Config {
            mode: cli.mode.or(mode).unwrap_or(Mode::Server),
            workers: cli.workers.or(workers),
            server: ServerSettings {
                listen: cli.listen.unwrap_or(server.listen),
                secret: cli.server_token.or(server.token).and_then(Secret::new),
                max_connections: server.max_connections,
                handshake_timeout: timeouts.handshake,
                accept_backoff: timeouts.accept_backoff,
            },
            client: ClientSettings {
                remotes: remotes
                    .into_iter()
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect(),
                secret: cli.client_token.or(client.token).and_then(Secret::new),
                interval: cli.interval.unwrap_or(client.interval),
                connect_timeout: timeouts.connect,
                handshake_timeout: timeouts.handshake,
                retry_delay: timeouts.retry_delay,
            },
            log_level: cli.log_level.unwrap_or(logging.level),
            log_format: cli.log_format.unwrap_or(logging.format),
            log_path: cli.log_path.or(logging.path),
        }
    }

    /// Reject configurations the selected mode cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.runs_server() && self.server.listen.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "listen is needed in server or both mode".into(),
            ));
        }
        if self.mode.runs_client() {
            if self.client.remotes.is_empty() {
                return Err(ConfigError::Invalid(
                    "remote addrs of echo server are needed in client or both mode".into(),
                ));
            }
            if self.client.interval.is_zero() {
                return Err(ConfigError::Invalid("interval must be non-zero".into()));
            }
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be non-zero".into()));
        }
        if let Some(path) = &self.log_path {
            if path.file_name().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "log path '{}' does not name a file",
                    path.display()
                )));
            }
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {1}", path = .0.display())]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file '{path}': {1}", path = .0.display())]
    TomlParse(PathBuf, toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
