//! Symbol identification and exchange constraint specification.

use crate::{Price, Size};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Traded symbol (e.g., "BTCUSDT").
///
/// Primary key for per-symbol execution state and whitelisting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Exchange constraints for a symbol.
///
/// Prices are floored to `tick_size`, quantities to `step_size`. Orders
/// whose floored quantity falls below `min_qty` must be skipped, never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    /// Minimum price increment.
    pub tick_size: Price,
    /// Minimum quantity increment.
    pub step_size: Size,
    /// Minimum order quantity.
    pub min_qty: Size,
    /// Whether the min-qty guard is enforced for this symbol.
    #[serde(default = "default_enforced")]
    pub enforced: bool,
}

fn default_enforced() -> bool {
    true
}

impl SymbolSpec {
    pub fn new(tick_size: Price, step_size: Size, min_qty: Size) -> Self {
        Self {
            tick_size,
            step_size,
            min_qty,
            enforced: true,
        }
    }

    /// Spec that applies no rounding and no minimum (for tests/dry-run).
    pub fn unconstrained() -> Self {
        Self {
            tick_size: Price::ZERO,
            step_size: Size::ZERO,
            min_qty: Size::ZERO,
            enforced: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_roundtrip() {
        let s = Symbol::from("BTCUSDT");
        assert_eq!(s.as_str(), "BTCUSDT");
        assert_eq!(s.to_string(), "BTCUSDT");
    }

    #[test]
    fn test_unconstrained_spec() {
        let spec = SymbolSpec::unconstrained();
        assert!(!spec.enforced);
        assert!(spec.tick_size.is_zero());
    }

    #[test]
    fn test_spec_defaults_enforced() {
        let spec = SymbolSpec::new(
            Price::new(dec!(0.1)),
            Size::new(dec!(0.001)),
            Size::new(dec!(0.01)),
        );
        assert!(spec.enforced);
    }
}
