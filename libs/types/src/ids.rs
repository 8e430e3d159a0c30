//! Identifier types for feed instruments
//!
//! The feed addresses instruments by a numeric token while the store and
//! every human-facing surface use the exchange stock code. Both are kept as
//! distinct newtypes so the two can never be confused at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::IdError;

/// Feed-assigned instrument token
///
/// Opaque to the collector: only used to route ticks and to build the
/// subscription list sent to the feed on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(u64);

impl InstrumentId {
    pub fn new(token: u64) -> Self {
        Self(token)
    }

    /// Get the raw feed token
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for InstrumentId {
    fn from(token: u64) -> Self {
        Self(token)
    }
}

/// Canonical stock code (e.g. "INFY", "RELIANCE")
///
/// Always trimmed and upper-cased, so `"infy "` and `"INFY"` name the same
/// instrument. This is the key under which candles are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StockCode(String);

impl StockCode {
    /// Create a new StockCode, normalizing case and whitespace
    pub fn new(code: impl AsRef<str>) -> Result<Self, IdError> {
        let normalized = code.as_ref().trim().to_uppercase();
        if normalized.is_empty() {
            return Err(IdError::BlankStockCode);
        }
        Ok(Self(normalized))
    }

    /// Get the code string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StockCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StockCode {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_id_serialization() {
        let id = InstrumentId::new(738561);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "738561");

        let deserialized: InstrumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_stock_code_normalization() {
        let code = StockCode::new("  infy ").unwrap();
        assert_eq!(code.as_str(), "INFY");
        assert_eq!(code, "INFY".parse::<StockCode>().unwrap());
    }

    #[test]
    fn test_stock_code_blank_rejected() {
        assert!(StockCode::new("tcs").is_ok());
        assert_eq!(StockCode::new("   "), Err(IdError::BlankStockCode));
        assert_eq!("".parse::<StockCode>(), Err(IdError::BlankStockCode));
    }

    #[test]
    fn test_stock_code_deserialization_normalizes() {
        let code: StockCode = serde_json::from_str("\"hdfcbank\"").unwrap();
        assert_eq!(code.as_str(), "HDFCBANK");

        let blank: Result<StockCode, _> = serde_json::from_str("\"  \"");
        assert!(blank.is_err());
    }
}

// ── Property-Based Tests ──
