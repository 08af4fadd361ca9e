//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Keep all state in memory and skip RocksDB entirely
    pub in_memory: bool,

    /// Commit configuration
    pub commit: CommitConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "ledger-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            in_memory: false,
            commit: CommitConfig::default(),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// Commit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitConfig {
    /// Bounded wait for a unit of work to commit (milliseconds)
    pub timeout_ms: u64,

    /// Store actor mailbox capacity (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            mailbox_capacity: 1_000,
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Sync the WAL before acknowledging a commit
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            sync_writes: true,
        }
    }
}

impl Config {
    /// In-memory configuration without persistence, used widely in tests
    pub fn ephemeral() -> Self {
        Self {
            in_memory: true,
            ..Self::default()
        }
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(in_memory) = std::env::var("LEDGER_IN_MEMORY") {
            config.in_memory = matches!(in_memory.as_str(), "1" | "true" | "yes");
        }

        if let Ok(timeout) = std::env::var("LEDGER_COMMIT_TIMEOUT_MS") {
            config.commit.timeout_ms = timeout.parse().map_err(|_| {
                crate::Error::Config(format!("Invalid LEDGER_COMMIT_TIMEOUT_MS: {}", timeout))
            })?;
        }

        Ok(config)
    }
}
