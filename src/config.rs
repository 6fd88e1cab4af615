//! Server Configuration
//!
//! All tunables are collected into one immutable [`Config`] that is built once
//! at startup (from command-line flags, falling back to `TTLKV_*` environment
//! variables, falling back to defaults) and then passed by reference to every
//! component that needs it.
//!
//! Durations are configured in whole seconds, matching the granularity the
//! cache exposes to clients (`SET key value EX <seconds>`).

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default port to listen on.
pub const DEFAULT_PORT: u16 = 3030;

/// Default host to bind to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// TTL applied when a client passes no TTL (or a TTL of zero).
pub const DEFAULT_TTL_SECS: u64 = 10;

/// Interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 1;

/// Upper bound on caller-visible request latency.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 2;

/// Interval between append-log flushes.
pub const DEFAULT_LOG_WRITE_INTERVAL_SECS: u64 = 5;

/// Connections that stay silent this long are closed.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 15;

/// Longest TTL accepted, from `EX` or as the default (ten years).
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Longest accepted sweep, log, write-timeout or idle interval (one day).
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Directory the per-run append log is written to.
pub const DEFAULT_LOG_DIR: &str = "./log";

/// Errors for configurations that cannot be run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A periodic interval was zero
    #[error("{0} must be at least one second")]
    ZeroInterval(&'static str),

    /// A duration setting was larger than its cap
    #[error("{name} must be at most {max} seconds")]
    TooLarge { name: &'static str, max: u64 },
}

/// Immutable process configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "ttlkv", version, about = "In-memory key-value cache with per-entry TTL")]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "TTLKV_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "TTLKV_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds between expiry sweeps
    #[arg(long = "sweep-interval", env = "TTLKV_SWEEP_INTERVAL", default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    /// Seconds a request may run before the caller gets a timeout
    #[arg(long = "write-timeout", env = "TTLKV_WRITE_TIMEOUT", default_value_t = DEFAULT_WRITE_TIMEOUT_SECS)]
    pub write_timeout_secs: u64,

    /// Enable the append-only write log
    #[arg(long = "log", env = "TTLKV_LOG")]
    pub logging_enabled: bool,

    /// Seconds between append-log flushes
    #[arg(long = "log-interval", env = "TTLKV_LOG_INTERVAL", default_value_t = DEFAULT_LOG_WRITE_INTERVAL_SECS)]
    pub log_write_interval_secs: u64,

    /// Directory for the append log
    #[arg(long = "log-dir", env = "TTLKV_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// TTL in seconds for entries set without one
    #[arg(long = "default-ttl", env = "TTLKV_DEFAULT_TTL", default_value_t = DEFAULT_TTL_SECS)]
    pub default_ttl_secs: u64,

    /// Seconds of client silence before a connection is closed
    #[arg(long = "idle-timeout", env = "TTLKV_IDLE_TIMEOUT", default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            logging_enabled: false,
            log_write_interval_secs: DEFAULT_LOG_WRITE_INTERVAL_SECS,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            default_ttl_secs: DEFAULT_TTL_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Rejects durations that would make a periodic task spin, or that put
    /// an expiry or tick beyond what the clock can represent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut intervals = vec![
            ("sweep interval", self.sweep_interval_secs),
            ("write timeout", self.write_timeout_secs),
            ("idle timeout", self.idle_timeout_secs),
        ];
        if self.logging_enabled {
            intervals.push(("log write interval", self.log_write_interval_secs));
        }

        for (name, secs) in intervals {
            if secs == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
            if secs > MAX_INTERVAL_SECS {
                return Err(ConfigError::TooLarge {
                    name,
                    max: MAX_INTERVAL_SECS,
                });
            }
        }

        if self.default_ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::TooLarge {
                name: "default TTL",
                max: MAX_TTL_SECS,
            });
        }
        Ok(())
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn log_write_interval(&self) -> Duration {
        Duration::from_secs(self.log_write_interval_secs)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
