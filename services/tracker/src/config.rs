//! Service configuration from command line flags and `TRACKER_*` variables

use crate::parse::ParsePolicy;
use clap::Parser;
use persistence::{FsyncPolicy, JournalConfig};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max-count must be at least 1")]
    ZeroMaxCount,

    #[error("fsync-every must be at least 1")]
    ZeroFsyncInterval,

    #[error("max-file-size must be at least 1024 bytes, got {0}")]
    FileSizeTooSmall(u64),
}

/// GPS location tracker: stores OsmAnd-style position reports and serves the latest ones
#[derive(Debug, Clone, Parser)]
#[command(name = "tracker")]
#[command(version)]
pub struct Config {
    /// Port to listen on (all interfaces)
    #[arg(short, long, env = "TRACKER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory holding the entry journal
    #[arg(long, env = "TRACKER_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Directory of static web assets served at `/`
    #[arg(long, env = "TRACKER_WEB_ROOT", default_value = "./web/dist")]
    pub web_root: PathBuf,

    /// Verbose logging, including HTTP access logs
    #[arg(short, long, env = "TRACKER_DEBUG")]
    pub debug: bool,

    /// How to treat malformed numeric fields in submitted updates
    #[arg(long, env = "TRACKER_PARSE_POLICY", value_enum, default_value_t = ParsePolicy::Lenient)]
    pub parse_policy: ParsePolicy,

    /// Upper bound for `/retrieve?count=`
    #[arg(long, env = "TRACKER_MAX_COUNT", default_value_t = u16::MAX)]
    pub max_count: u16,

    /// Fsync the journal every N appends (1 = every append)
    #[arg(long, env = "TRACKER_FSYNC_EVERY", default_value_t = 1)]
    pub fsync_every: usize,

    /// Journal file size that triggers rotation, in bytes
    #[arg(long, env = "TRACKER_MAX_FILE_SIZE", default_value_t = 64 * 1024 * 1024)]
    pub max_file_size: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_count == 0 {
            return Err(ConfigError::ZeroMaxCount);
        }
        if self.fsync_every == 0 {
            return Err(ConfigError::ZeroFsyncInterval);
        }
        if self.max_file_size < 1024 {
            return Err(ConfigError::FileSizeTooSmall(self.max_file_size));
        }
        Ok(())
    }

    pub fn journal_config(&self) -> JournalConfig {
        JournalConfig {
            max_file_size: self.max_file_size,
            fsync_policy: FsyncPolicy::every(self.fsync_every),
            ..JournalConfig::new(&self.data_dir)
        }
    }

    /// The static asset directory, if it exists.
    pub fn web_root_if_present(&self) -> Option<PathBuf> {
        self.web_root.is_dir().then(|| self.web_root.clone())
    }
}
