//! Static routing of subjects to upstream sources

use forex_core::{AssetType, CurrencyPair};
use serde::{Deserialize, Serialize};

/// Symbols served by the precious-metals source
pub const COMMODITY_SYMBOLS: &[&str] = &["XAU", "XAG", "XPT", "XPD"];

/// Symbols treated as cryptocurrencies when classifying a query
pub const CRYPTO_SYMBOLS: &[&str] = &["BTC", "ETH", "SOL", "XRP", "LTC"];

/// Upstream partition a pair belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Commodity,
    Currency,
}

impl AssetClass {
    /// Class of `pair`, decided by its base leg
    pub fn of(pair: &CurrencyPair) -> Self {
        if COMMODITY_SYMBOLS.contains(&pair.base()) {
            Self::Commodity
        } else {
            Self::Currency
        }
    }
}

/// Coarse asset type for a pair, used when building a query context
pub fn asset_type_of(pair: &CurrencyPair) -> AssetType {
    if COMMODITY_SYMBOLS.contains(&pair.base()) || pair.base() == "CL" {
        AssetType::Commodity
    } else if CRYPTO_SYMBOLS.contains(&pair.base()) {
        AssetType::Crypto
    } else {
        AssetType::Forex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(s: &str) -> CurrencyPair {
        s.parse().unwrap()
    }

    #[test]
    fn test_routing_table() {
        for metal in ["XAU/USD", "XAG/USD", "XPT/EUR", "XPD/USD"] {
            assert_eq!(AssetClass::of(&pair(metal)), AssetClass::Commodity, "{metal}");
        }
        for currency in ["EUR/USD", "USD/JPY", "BTC/USD", "USD/XAU"] {
            assert_eq!(AssetClass::of(&pair(currency)), AssetClass::Currency, "{currency}");
        }
    }

    #[test]
    fn test_asset_type() {
        assert_eq!(asset_type_of(&pair("XAU/USD")), AssetType::Commodity);
        assert_eq!(asset_type_of(&pair("CL/USD")), AssetType::Commodity);
        assert_eq!(asset_type_of(&pair("BTC/USD")), AssetType::Crypto);
        assert_eq!(asset_type_of(&pair("GBP/USD")), AssetType::Forex);
    }
}
