use crate::errors::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where and how verbosely the engine logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base directory for rolling log files; `None` leaves logging unconfigured.
    pub dir: Option<PathBuf>,
    /// error|warn|info|debug|trace
    pub level: String,
    /// Number of rolled files kept per appender.
    pub retention: u32,
    /// Also persist `devlog!` lines to `dev.log`.
    pub dev_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: None, level: "info".into(), retention: 7, dev_file: false }
    }
}

/// Safety limits applied by the executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Upper bound for an explicit `limit`; larger requests are clamped.
    pub max_limit: usize,
    pub max_sort_fields: usize,
    pub max_projection_fields: usize,
    /// Queries at or above this duration are logged and counted as slow.
    pub slow_query_ms: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self { max_limit: 10_000, max_sort_fields: 8, max_projection_fields: 64, slow_query_ms: 500 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub log: LogConfig,
    pub query: QueryLimits,
}

impl EngineConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    ///
    /// # Errors
    /// `Toml` on malformed input.
    pub fn from_toml_str(s: &str) -> DbResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Defaults, then the file at `path` (if any), then `SHELFDB_*` environment variables.
    ///
    /// # Errors
    /// `Io` if the file can't be read, `Toml` if it can't be parsed, `Config`
    /// if an environment override is malformed.
    pub fn load(path: Option<&Path>) -> DbResult<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_toml_str(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Apply `SHELFDB_*` overrides looked up through `var`.
    ///
    /// # Errors
    /// `Config` when a numeric override doesn't parse.
    pub fn apply_overrides<F>(&mut self, var: F) -> DbResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = var("SHELFDB_LOG_DIR") {
            self.log.dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = var("SHELFDB_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(n) = var("SHELFDB_LOG_RETENTION") {
            self.log.retention = parse_num("SHELFDB_LOG_RETENTION", &n)?;
        }
        if let Some(n) = var("SHELFDB_MAX_LIMIT") {
            self.query.max_limit = parse_num("SHELFDB_MAX_LIMIT", &n)?;
        }
        if let Some(n) = var("SHELFDB_SLOW_QUERY_MS") {
            self.query.slow_query_ms = parse_num("SHELFDB_SLOW_QUERY_MS", &n)?;
        }
        if let Some(v) = var("SHELFDB_DEV_LOG") {
            self.log.dev_file = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> DbResult<T> {
    raw.trim().parse().map_err(|_| DbError::Config(format!("{key} must be a non-negative integer, got '{raw}'")))
}
