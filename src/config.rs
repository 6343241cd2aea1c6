//! Optional TOML configuration.
//!
//! A config file carries defaults for the same knobs the CLI exposes; flags
//! given on the command line win. Example:
//!
//! ```toml
//! out = "bench-session.jsonl"
//! format = "jsonl"
//! device = "thrustmaster"
//! print = true
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::writer::OutputFormat;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Output file path.
    pub out: Option<PathBuf>,
    /// Output encoding (`csv` or `jsonl`).
    pub format: Option<OutputFormat>,
    /// Device name substring filter.
    pub device: Option<String>,
    /// Echo a summary line per record to stdout.
    pub print: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
