use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// One side of a quote: either a usable number or the placeholder the
/// screen renders while a source has nothing for us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateValue {
    Available(Decimal),
    Unavailable,
}

impl RateValue {
    pub fn available(self) -> Option<Decimal> {
        match self {
            RateValue::Available(rate) => Some(rate),
            RateValue::Unavailable => None,
        }
    }
}

impl fmt::Display for RateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateValue::Available(rate) => write!(f, "{rate}"),
            RateValue::Unavailable => write!(f, "n/a"),
        }
    }
}

/// Market and platform-quoted rates for one destination currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuote {
    pub market_rate: RateValue,
    pub tuma_rate: RateValue,
}

/// Quotes keyed by destination currency code, rebuilt wholesale on every
/// poll tick. Individual entries are never mutated in place.
pub type RateBoard = HashMap<String, RateQuote>;

/// One complete fetch cycle for a base currency.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub base: String,
    pub fetched_at: DateTime<Utc>,
    pub quotes: RateBoard,
}

impl BoardSnapshot {
    /// Placeholder published before the first fetch completes.
    pub fn empty(base: String) -> Self {
        Self {
            base,
            fetched_at: Utc::now(),
            quotes: RateBoard::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unavailable_renders_as_placeholder() {
        assert_eq!(RateValue::Unavailable.to_string(), "n/a");
        assert_eq!(RateValue::Available(dec!(129.53)).to_string(), "129.53");
    }

    #[test]
    fn available_unwraps_to_the_rate() {
        assert_eq!(RateValue::Available(dec!(1.08)).available(), Some(dec!(1.08)));
        assert_eq!(RateValue::Unavailable.available(), None);
    }
}
