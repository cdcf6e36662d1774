//! Configuration loading and typed config structures for Gamecast.
//!
//! The configuration lives in an optional `gamecast.yaml` next to the
//! host binary. Every field has a default, so an empty file (or no file)
//! yields a working loopback broadcaster on port 7878 at ~60 Hz.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Gamecast configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GamecastConfig {
    /// Broadcast server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Producer-side sampling settings.
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// Simulated host settings.
    #[serde(default)]
    pub host: HostConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GamecastConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `GAMECAST_HOST` overrides `server.host`
    /// - `GAMECAST_PORT` overrides `server.port`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply process environment
    /// overrides, and validate.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse_with_env(yaml, |key| std::env::var(key).ok())
    }

    /// Parse configuration from a YAML string, apply overrides from
    /// `lookup`, and validate.
    pub fn parse_with_env<F>(yaml: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.server.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.sampler.validate()?;
        self.host.validate()
    }
}

/// Broadcast server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (loopback by default).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on. `0` picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path that accepts WebSocket upgrades.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Milliseconds between broadcast ticks.
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,

    /// Deadline for a single client send before the client is evicted.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// How long `stop` waits for tasks to exit before abandoning them.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl ServerConfig {
    /// A loopback config on an OS-assigned port with default timings.
    pub fn ephemeral() -> Self {
        Self {
            port: 0,
            ..Self::default()
        }
    }

    /// Apply `GAMECAST_HOST` / `GAMECAST_PORT` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GAMECAST_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("GAMECAST_PORT") {
            self.port = port.trim().parse().map_err(|e| ConfigError::Invalid {
                field: "server.port",
                reason: format!("GAMECAST_PORT={port}: {e}"),
            })?;
        }
        Ok(())
    }

    /// The socket address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                field: "server.host",
                reason: format!("{}:{} is not a socket address: {e}", self.host, self.port),
            })
    }

    /// Time between broadcast ticks.
    pub const fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Per-send deadline.
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Shutdown grace period.
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if !self.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "server.ws_path",
                reason: format!("{:?} must start with '/'", self.ws_path),
            });
        }
        if self.broadcast_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "server.broadcast_interval_ms",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "server.send_timeout_ms",
                reason: String::from("must be greater than zero"),
            });
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

/// Producer-side sampling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SamplerConfig {
    /// Log at most one producer failure per this many host ticks.
    #[serde(default = "default_log_every")]
    pub error_log_every: u64,

    /// Emit a debug heartbeat every this many host ticks.
    #[serde(default = "default_log_every")]
    pub heartbeat_every: u64,
}

impl SamplerConfig {
    fn validate(self) -> Result<(), ConfigError> {
        if self.error_log_every == 0 {
            return Err(ConfigError::Invalid {
                field: "sampler.error_log_every",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.heartbeat_every == 0 {
            return Err(ConfigError::Invalid {
                field: "sampler.heartbeat_every",
                reason: String::from("must be greater than zero"),
            });
        }
        Ok(())
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            error_log_every: default_log_every(),
            heartbeat_every: default_log_every(),
        }
    }
}

/// Simulated host configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    /// Host update rate in ticks per second.
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    /// Random seed for the simulated match.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of players in the simulated lobby.
    #[serde(default = "default_players")]
    pub players: u8,

    /// Slot of the local player.
    #[serde(default)]
    pub local_player: u8,
}

impl HostConfig {
    /// Time between host ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1)
            .checked_div(self.tick_rate_hz)
            .unwrap_or(Duration::from_secs(1))
    }

    fn validate(self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::Invalid {
                field: "host.tick_rate_hz",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.players > 0 && self.local_player >= self.players {
            return Err(ConfigError::Invalid {
                field: "host.local_player",
                reason: format!(
                    "slot {} is outside a {}-player lobby",
                    self.local_player, self.players
                ),
            });
        }
        Ok(())
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            seed: default_seed(),
            players: default_players(),
            local_player: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    String::from("127.0.0.1")
}

const fn default_port() -> u16 {
    7878
}

fn default_ws_path() -> String {
    String::from("/")
}

const fn default_broadcast_interval_ms() -> u64 {
    16
}

const fn default_send_timeout_ms() -> u64 {
    250
}

const fn default_shutdown_grace_ms() -> u64 {
    2000
}

const fn default_log_every() -> u64 {
    300
}

const fn default_tick_rate_hz() -> u32 {
    60
}

const fn default_seed() -> u64 {
    7
}

const fn default_players() -> u8 {
    10
}

fn default_log_level() -> String {
    String::from("info")
}
