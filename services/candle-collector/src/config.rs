//! Collector configuration
//!
//! The instrument universe is a static JSON file loaded once at startup:
//!
//! ```json
//! { "stocks": [ { "instrument_token": 738561, "stock_code": "reliance" } ] }
//! ```
//!
//! Every load failure is fatal. A collector with nothing to collect is a
//! misconfiguration, never a valid idle state.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tick_types::errors::IdError;
use tick_types::ids::{InstrumentId, StockCode};

use crate::candles::StalePolicy;

/// Default location of the instrument universe.
pub const DEFAULT_CONFIG_FILE: &str = "config400.json";

/// Default number of finalized candles kept per instrument.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed instrument config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("instrument config contains no instruments")]
    Empty,

    #[error("instrument token {0} is listed more than once")]
    DuplicateInstrument(InstrumentId),

    #[error("stock code {0} is listed more than once")]
    DuplicateStockCode(StockCode),

    #[error("shard {shard} owns no instruments out of {universe}")]
    EmptyShard { shard: String, universe: usize },
}

/// One entry of the instrument universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub instrument_token: InstrumentId,
    pub stock_code: StockCode,
}

impl InstrumentConfig {
    pub fn new(instrument_token: u64, stock_code: &str) -> Result<Self, IdError> {
        Ok(Self {
            instrument_token: InstrumentId::new(instrument_token),
            stock_code: StockCode::new(stock_code)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UniverseFile {
    #[serde(default)]
    stocks: Vec<InstrumentConfig>,
}

/// Parse and validate an instrument universe from JSON text.
pub fn parse_universe(raw: &str) -> Result<Vec<InstrumentConfig>, ConfigError> {
    let file: UniverseFile = serde_json::from_str(raw)?;
    validate_universe(&file.stocks)?;
    Ok(file.stocks)
}

/// Load the instrument universe from disk.
pub fn load_universe(path: &Path) -> Result<Vec<InstrumentConfig>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_universe(&raw)
}

/// Reject empty universes, duplicated tokens and duplicated stock codes.
///
/// Codes are compared after normalization: each code owns one pair of store
/// keys, so two tokens mapping to one code would overwrite each other.
pub fn validate_universe(universe: &[InstrumentConfig]) -> Result<(), ConfigError> {
    if universe.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut tokens = BTreeSet::new();
    let mut codes = BTreeSet::new();
    for entry in universe {
        if !tokens.insert(entry.instrument_token) {
            return Err(ConfigError::DuplicateInstrument(entry.instrument_token));
        }
        if !codes.insert(&entry.stock_code) {
            return Err(ConfigError::DuplicateStockCode(entry.stock_code.clone()));
        }
    }
    Ok(())
}

/// Tunables of the aggregation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Maximum finalized candles retained per instrument.
    pub history_limit: usize,
    /// Handling of ticks older than the open candle.
    pub stale_policy: StalePolicy,
}

impl CollectorConfig {
    pub fn new(history_limit: usize, stale_policy: StalePolicy) -> Self {
        Self {
            history_limit: history_limit.max(1),
            stale_policy,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            stale_policy: StalePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_universe() {
        let raw = r#"{
            "stocks": [
                {"instrument_token": 738561, "stock_code": "reliance", "sector": "energy"},
                {"instrument_token": 408065, "stock_code": "INFY"}
            ]
        }"#;

        let universe = parse_universe(raw).unwrap();
        assert_eq!(universe.len(), 2);
        assert_eq!(universe[0], InstrumentConfig::new(738561, "RELIANCE").unwrap());
        assert_eq!(universe[1].stock_code.as_str(), "INFY");
    }

    #[test]
    fn test_empty_universe_rejected() {
        assert!(matches!(
            parse_universe(r#"{"stocks": []}"#),
            Err(ConfigError::Empty)
        ));
        assert!(matches!(parse_universe("{}"), Err(ConfigError::Empty)));
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let raw = r#"{"stocks": [
            {"instrument_token": 1, "stock_code": "AAA"},
            {"instrument_token": 1, "stock_code": "BBB"}
        ]}"#;
        assert!(matches!(
            parse_universe(raw),
            Err(ConfigError::DuplicateInstrument(id)) if id == InstrumentId::new(1)
        ));
    }

    #[test]
    fn test_duplicate_stock_code_rejected() {
        let raw = r#"{"stocks": [
            {"instrument_token": 1, "stock_code": "aaa"},
            {"instrument_token": 2, "stock_code": " AAA"}
        ]}"#;
        assert!(matches!(
            parse_universe(raw),
            Err(ConfigError::DuplicateStockCode(code)) if code.as_str() == "AAA"
        ));
    }

    #[test]
    fn test_instrument_config_rejects_blank_code() {
        assert_eq!(InstrumentConfig::new(1, "  "), Err(IdError::BlankStockCode));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            parse_universe("{\"stocks\": [oops"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            parse_universe(r#"{"stocks": [{"instrument_token": 1, "stock_code": " "}]}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = load_universe(Path::new("/nonexistent/config400.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("config400.json"));
    }

    #[test]
    fn test_collector_config_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.stale_policy, StalePolicy::TrustTickOrder);

        assert_eq!(CollectorConfig::new(0, StalePolicy::RejectStale).history_limit, 1);
    }
}
