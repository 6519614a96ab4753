//! Historical snapshot persistence.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct HistoryConfig {
    /// Directory holding the hourly `traffic_<YYYY-MM-DD_HH>.json` buckets.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_save_interval")]
    pub save_interval_secs: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_save_interval() -> u64 {
    30
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            save_interval_secs: default_save_interval(),
        }
    }
}
