//! Log destinations from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for daily-rolling diagnostic logs; unset logs to stderr only
    pub dir: Option<PathBuf>,
    /// JSONL query audit log; unset disables it
    pub query_log: Option<PathBuf>,
}
