use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WorkloadError};

/// Environment variable holding the number of Bao arms.
pub const NUM_ARMS_ENV: &str = "BAO_NUM_ARMS";
pub const DEFAULT_NUM_ARMS: u32 = 5;

/// Read the arm count once; every `enable` transition applies this value.
pub fn arm_count_from_env() -> Result<u32> {
    parse_arm_count(std::env::var(NUM_ARMS_ENV).ok().as_deref())
}

pub fn parse_arm_count(value: Option<&str>) -> Result<u32> {
    match value.map(str::trim) {
        None | Some("") => Ok(DEFAULT_NUM_ARMS),
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            WorkloadError::Config(format!("{} must be a non-negative integer, got {:?}", NUM_ARMS_ENV, raw))
        }),
    }
}

/// Where the Bao server and its control scripts live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaoSettings {
    /// Directory containing `baoctl.py`, `bao.db` and the model directories
    pub server_dir: PathBuf,
    pub start_script: PathBuf,
    pub shutdown_script: PathBuf,
    /// Interpreter used to run `baoctl.py`
    pub python: String,
}

impl Default for BaoSettings {
    fn default() -> Self {
        Self {
            server_dir: PathBuf::from("bao/bao_server"),
            start_script: PathBuf::from("./postgres-bao-start.sh"),
            shutdown_script: PathBuf::from("./postgres-bao-shutdown.sh"),
            python: String::from("python3"),
        }
    }
}

impl BaoSettings {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pgbao")
            .join("settings.toml")
    }

    /// Load settings from `path`, or from the default location.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
            .map_err(|e| WorkloadError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
