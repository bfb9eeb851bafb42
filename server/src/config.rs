//! Configuration for the chessmentor server
//!
//! Settings come from the environment first; command-line flags in `main`
//! override them. The data directory resolves as:
//! 1. CHESSMENTOR_DATA_DIR environment variable
//! 2. the platform data directory (`~/.local/share/chessmentor` on Linux)
//! 3. ./data (fallback for development)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::analysis::{EvaluatorConfig, RetentionStrategy};
use crate::session::opening_book::OpeningBookError;
use crate::session::{OpeningBook, SessionConfig};

const DEV_DATA_DIR: &str = "./data";
const DATABASE_FILE: &str = "chessmentor.db";

const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ANALYSIS_DEPTH: u8 = 12;
const DEFAULT_EVAL_DEPTHS: &str = "8-12";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("CHESSMENTOR_OPENING_BOOK: {0}")]
    OpeningBook(#[from] OpeningBookError),
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub stockfish_path: Option<PathBuf>,
    pub oracle_timeout: Duration,
    /// Ascending depths searched by the position evaluator.
    pub eval_depths: Vec<u8>,
    pub eval_strategy: RetentionStrategy,
    pub analysis_depth: u8,
    pub opening_book: OpeningBook,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = var("CHESSMENTOR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let oracle_timeout = match var("CHESSMENTOR_ORACLE_TIMEOUT_SECS") {
            Some(v) => parse_timeout(&v)?,
            None => Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
        };

        let eval_depths = parse_depths(
            &var("CHESSMENTOR_EVAL_DEPTHS").unwrap_or_else(|| DEFAULT_EVAL_DEPTHS.to_string()),
        )?;

        let eval_strategy = match var("CHESSMENTOR_EVAL_STRATEGY") {
            Some(v) => RetentionStrategy::from_str(&v)
                .map_err(|e| invalid("CHESSMENTOR_EVAL_STRATEGY", e))?,
            None => RetentionStrategy::default(),
        };

        let analysis_depth = match var("CHESSMENTOR_ANALYSIS_DEPTH") {
            Some(v) => parse_depth(&v).map_err(|e| invalid("CHESSMENTOR_ANALYSIS_DEPTH", e))?,
            None => DEFAULT_ANALYSIS_DEPTH,
        };

        let opening_book = match var("CHESSMENTOR_OPENING_BOOK") {
            Some(v) => v.parse()?,
            None => OpeningBook::new(),
        };

        Ok(Self {
            data_dir,
            stockfish_path: var("STOCKFISH_PATH").map(PathBuf::from),
            oracle_timeout,
            eval_depths,
            eval_strategy,
            analysis_depth,
            opening_book,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn evaluator(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            depths: self.eval_depths.clone(),
            strategy: self.eval_strategy,
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            analysis_depth: self.analysis_depth,
            opening_book: self.opening_book.clone(),
        }
    }
}

/// The platform data directory, or `./data` when there is none.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "chessmentor")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(DEV_DATA_DIR))
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|_| invalid("CHESSMENTOR_ORACLE_TIMEOUT_SECS", format!("not a number: {value:?}")))?;
    if secs == 0 {
        return Err(invalid("CHESSMENTOR_ORACLE_TIMEOUT_SECS", "must be positive"));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_depth(value: &str) -> Result<u8, String> {
    match value.trim().parse::<u8>() {
        Ok(0) | Err(_) => Err(format!("not a positive depth: {value:?}")),
        Ok(depth) => Ok(depth),
    }
}

/// Parse `"8-12"` (inclusive range) or `"8,10,12"` into ascending depths.
pub fn parse_depths(value: &str) -> Result<Vec<u8>, ConfigError> {
    const KEY: &str = "CHESSMENTOR_EVAL_DEPTHS";
    let depths: Vec<u8> = if let Some((lo, hi)) = value.split_once('-') {
        let lo = parse_depth(lo).map_err(|e| invalid(KEY, e))?;
        let hi = parse_depth(hi).map_err(|e| invalid(KEY, e))?;
        (lo..=hi).collect()
    } else {
        value
            .split(',')
            .map(|d| parse_depth(d).map_err(|e| invalid(KEY, e)))
            .collect::<Result<_, _>>()?
    };
    if depths.is_empty() {
        return Err(invalid(KEY, format!("empty range: {value:?}")));
    }
    if depths.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid(KEY, format!("depths must ascend: {value:?}")));
    }
    Ok(depths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.oracle_timeout, Duration::from_secs(30));
        assert_eq!(config.eval_depths, vec![8, 9, 10, 11, 12]);
        assert_eq!(config.eval_strategy, RetentionStrategy::LargestMagnitude);
        assert_eq!(config.analysis_depth, 12);
        assert!(config.opening_book.is_empty());
        assert!(config.stockfish_path.is_none());
        assert!(!config.data_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_env_values() {
        let config = config(&[
            ("CHESSMENTOR_DATA_DIR", "/tmp/cm"),
            ("STOCKFISH_PATH", "/opt/sf"),
            ("CHESSMENTOR_ORACLE_TIMEOUT_SECS", "5"),
            ("CHESSMENTOR_EVAL_DEPTHS", "6,10,14"),
            ("CHESSMENTOR_EVAL_STRATEGY", "deepest"),
            ("CHESSMENTOR_ANALYSIS_DEPTH", "9"),
            ("CHESSMENTOR_OPENING_BOOK", "1:e7e5,3:b8c6"),
        ])
        .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/cm/chessmentor.db"));
        assert_eq!(config.stockfish_path, Some(PathBuf::from("/opt/sf")));
        assert_eq!(config.oracle_timeout, Duration::from_secs(5));
        assert_eq!(config.evaluator().depths, vec![6, 10, 14]);
        assert_eq!(config.evaluator().strategy, RetentionStrategy::Deepest);
        assert_eq!(config.session().analysis_depth, 9);
        assert_eq!(config.opening_book.reply_at(3), Some("b8c6"));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = config(&[("CHESSMENTOR_EVAL_DEPTHS", "  "), ("STOCKFISH_PATH", "")]).unwrap();
        assert_eq!(config.eval_depths.len(), 5);
        assert!(config.stockfish_path.is_none());
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("CHESSMENTOR_ORACLE_TIMEOUT_SECS", "soon"),
            ("CHESSMENTOR_ORACLE_TIMEOUT_SECS", "0"),
            ("CHESSMENTOR_EVAL_DEPTHS", "12-8"),
            ("CHESSMENTOR_EVAL_DEPTHS", "10,8"),
            ("CHESSMENTOR_EVAL_DEPTHS", "0-4"),
            ("CHESSMENTOR_EVAL_STRATEGY", "newest"),
            ("CHESSMENTOR_ANALYSIS_DEPTH", "-1"),
        ] {
            assert!(
                matches!(config(&[(key, value)]), Err(ConfigError::Invalid { .. })),
                "{key}={value} should be rejected"
            );
        }
        assert!(matches!(
            config(&[("CHESSMENTOR_OPENING_BOOK", "1:zz")]),
            Err(ConfigError::OpeningBook(_))
        ));
    }
}
