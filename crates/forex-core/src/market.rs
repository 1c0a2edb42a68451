//! Market data types shared by the price service and the technical task

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CurrencyPair;

/// Where a price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Fetched from a live upstream source
    Real,
    /// Generated locally because no upstream was available
    Mock,
}

impl Provenance {
    pub fn is_real(self) -> bool {
        self == Self::Real
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

/// A current quote for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub pair: CurrencyPair,
    /// Mid price
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    /// Timestamp reported by the upstream source
    pub timestamp: DateTime<Utc>,
    /// Name of the upstream source
    pub source: String,
}

impl PriceQuote {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Daily open/high/low/close bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Ohlc {
    /// High minus low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Movement of the current price against a previous close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalChange {
    pub previous_close: f64,
    /// `current - previous_close`
    pub change: f64,
    /// `change / previous_close`
    pub change_fraction: f64,
}

impl HistoricalChange {
    /// Compare `current` with `previous_close`; `None` when the previous
    /// close is not a positive finite number.
    pub fn between(current: f64, previous_close: f64) -> Option<Self> {
        if !(previous_close.is_finite() && previous_close > 0.0 && current.is_finite()) {
            return None;
        }
        let change = current - previous_close;
        Some(Self {
            previous_close,
            change,
            change_fraction: change / previous_close,
        })
    }

    /// Change expressed in percent
    pub fn change_pct(&self) -> f64 {
        self.change_fraction * 100.0
    }
}

/// Price context handed to the technical analysis provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub price: f64,
    pub provenance: Provenance,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<HistoricalChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ohlc: Option<Ohlc>,
}

impl MarketData {
    /// Market data backed by a locally generated placeholder price
    pub fn mock(price: f64) -> Self {
        Self {
            price,
            provenance: Provenance::Mock,
            source: "placeholder".to_string(),
            change: None,
            ohlc: None,
        }
    }
}
