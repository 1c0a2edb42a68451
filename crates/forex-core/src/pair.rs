//! Currency pair identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A traded instrument expressed as `BASE/QUOTE`.
///
/// Codes are upper-case ASCII alphanumerics of two to five characters, which
/// covers ISO currencies (`EUR`), metals (`XAU`), energy (`CL`) and crypto
/// tickers (`BTC`).
///
/// # Example
///
/// ```
/// use forex_core::CurrencyPair;
///
/// let pair: CurrencyPair = "eurusd".parse().unwrap();
/// assert_eq!(pair.to_string(), "EUR/USD");
/// assert_eq!(pair.base(), "EUR");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

fn valid_code(code: &str) -> bool {
    (2..=5).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric())
}

impl CurrencyPair {
    /// Build a pair from its two legs
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Result<Self> {
        let base = base.as_ref().trim().to_ascii_uppercase();
        let quote = quote.as_ref().trim().to_ascii_uppercase();
        if !valid_code(&base) || !valid_code(&quote) || base == quote {
            return Err(Error::InvalidPair(format!("{base}/{quote}")));
        }
        Ok(Self { base, quote })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Whether the pair is quoted in yen (two-decimal pip convention)
    pub fn is_jpy_quoted(&self) -> bool {
        self.quote == "JPY"
    }

    /// Concatenated form used by some upstream APIs, e.g. `EURUSD`
    pub fn compact(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

/// EUR/USD, used when a query names no recognisable subject
impl Default for CurrencyPair {
    fn default() -> Self {
        Self {
            base: "EUR".to_string(),
            quote: "USD".to_string(),
        }
    }
}

impl FromStr for CurrencyPair {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let cleaned = s.trim().to_ascii_uppercase();
        if let Some((base, quote)) = cleaned.split_once(['/', ' ', '-', '_']) {
            return Self::new(base, quote);
        }
        if cleaned.len() == 6 && cleaned.is_ascii() {
            let (base, quote) = cleaned.split_at(3);
            return Self::new(base, quote);
        }
        Err(Error::InvalidPair(s.to_string()))
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
