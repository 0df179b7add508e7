//! Search configuration: worker count `x` and range end `y`.
//!
//! Values come from a `key=value` text file (default `config.txt`) and/or
//! command-line overrides. Everything handed to the engine has already
//! passed validation here; the engine does not re-check it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config.txt";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to open configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration format on line {line}: expected key=value")]
    InvalidFormat { line: usize },
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
    #[error("{key} must be at least {min}, got {value}")]
    OutOfRange {
        key: &'static str,
        min: i64,
        value: i64,
    },
    #[error("missing configuration key '{0}'")]
    MissingKey(&'static str),
}

/// Validated search parameters. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    worker_count: u64,
    range_end: u64,
}

impl SearchConfig {
    /// Validate and clamp. `worker_count > range_end` is clamped down with a warning.
    pub fn new(worker_count: i64, range_end: i64) -> Result<Self, ConfigError> {
        if worker_count < 1 {
            return Err(ConfigError::OutOfRange {
                key: "x",
                min: 1,
                value: worker_count,
            });
        }
        if range_end < 2 {
            return Err(ConfigError::OutOfRange {
                key: "y",
                min: 2,
                value: range_end,
            });
        }

        let mut worker_count = worker_count as u64;
        let range_end = range_end as u64;
        if worker_count > range_end {
            warn!(
                requested = worker_count,
                adjusted = range_end,
                "number of threads exceeds the range size, adjusting x to {}",
                range_end
            );
            worker_count = range_end;
        }

        Ok(Self {
            worker_count,
            range_end,
        })
    }

    pub fn worker_count(&self) -> u64 {
        self.worker_count
    }

    pub fn range_end(&self) -> u64 {
        self.range_end
    }
}

/// Raw values before validation. Either field may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawConfig {
    pub x: Option<i64>,
    pub y: Option<i64>,
}

impl RawConfig {
    /// Parse `key=value` lines. Whitespace around keys and values is ignored,
    /// blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut raw = RawConfig::default();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::InvalidFormat { line: index + 1 });
            };
            let value = value.trim();

            match key.trim() {
                "x" => raw.x = Some(parse_value("x", value)?),
                "y" => raw.y = Some(parse_value("y", value)?),
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }

        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Values from `other` win where present.
    pub fn merge(self, other: RawConfig) -> Self {
        RawConfig {
            x: other.x.or(self.x),
            y: other.y.or(self.y),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }

    pub fn validate(self) -> Result<SearchConfig, ConfigError> {
        let x = self.x.ok_or(ConfigError::MissingKey("x"))?;
        let y = self.y.ok_or(ConfigError::MissingKey("y"))?;
        SearchConfig::new(x, y)
    }
}

fn parse_value(key: &'static str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Build the final config from the file at `path` plus command-line overrides.
/// The file is not read when the overrides already supply both values.
pub fn resolve(path: &Path, overrides: RawConfig) -> Result<SearchConfig, ConfigError> {
    if overrides.is_complete() {
        return overrides.validate();
    }
    RawConfig::load(path)?.merge(overrides).validate()
}
