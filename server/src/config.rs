//! Server configuration from the environment.
//!
//! PodCache is configured entirely through environment variables:
//!
//! | Variable               | Default | Meaning                               |
//! |------------------------|---------|---------------------------------------|
//! | `PODCACHE_PORT`        | 6379    | TCP listen port                       |
//! | `PODCACHE_PARTITIONS`  | 3       | Memory partition count (1-255)        |
//! | `PODCACHE_CAPACITY_MB` | 100     | Total memory budget in megabytes      |
//! | `CAS_BASE_PATH`        | —       | Parent directory for the disk tier (required) |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default TCP listen port.
pub const DEFAULT_PORT: u16 = 6379;

/// Default memory partition count.
pub const DEFAULT_PARTITIONS: u8 = 3;

/// Default memory budget in megabytes.
pub const DEFAULT_CAPACITY_MB: u64 = 100;

/// Configuration errors; each one is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable did not parse as the expected type.
    #[error("invalid {key}: {value:?}")]
    Invalid {
        /// The environment variable name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },

    /// `PODCACHE_PARTITIONS` was zero.
    #[error("PODCACHE_PARTITIONS must be between 1 and 255")]
    ZeroPartitions,

    /// `CAS_BASE_PATH` was not set.
    #[error("CAS_BASE_PATH environment variable not set")]
    MissingDiskRoot,
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen port.
    pub port: u16,
    /// Memory partition count (1-255).
    pub partitions: u8,
    /// Total memory budget in bytes.
    pub capacity: u64,
    /// Parent directory for the disk tier's base directory.
    pub disk_root: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_value("PODCACHE_PORT", env_value("PODCACHE_PORT"), DEFAULT_PORT)?;
        let partitions = parse_value(
            "PODCACHE_PARTITIONS",
            env_value("PODCACHE_PARTITIONS"),
            DEFAULT_PARTITIONS,
        )?;
        if partitions == 0 {
            return Err(ConfigError::ZeroPartitions);
        }
        let capacity_mb = parse_value(
            "PODCACHE_CAPACITY_MB",
            env_value("PODCACHE_CAPACITY_MB"),
            DEFAULT_CAPACITY_MB,
        )?;
        let disk_root = env::var_os("CAS_BASE_PATH")
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingDiskRoot)?;

        Ok(Self {
            port,
            partitions,
            capacity: capacity_mb * 1024 * 1024,
            disk_root,
        })
    }
}

fn env_value(key: &'static str) -> Option<String> {
    match env::var(key) {
        Ok(value) => Some(value),
        Err(env::VarError::NotPresent) => None,
        Err(env::VarError::NotUnicode(raw)) => Some(raw.to_string_lossy().into_owned()),
    }
}

/// Parse an optional raw value, falling back to `default` when absent.
fn parse_value<T: FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
