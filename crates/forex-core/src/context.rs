//! Parsed query context
//!
//! A [`QueryContext`] is the structured form of the user's free-form query. It
//! is produced once during parsing and shared read-only by every later stage.

use serde::{Deserialize, Serialize};

use crate::CurrencyPair;

/// Instrument category of the subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    #[default]
    Forex,
    Commodity,
    Crypto,
    Index,
    Unknown,
}

/// Time horizon the user is asking about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    #[default]
    ShortTerm,
    MediumTerm,
    LongTerm,
}

/// What the user wants out of the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIntent {
    #[default]
    TradingSignal,
    BuySignal,
    SellSignal,
    MarketOverview,
    RiskAssessment,
}

/// Declared appetite for risk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

/// Loose extras picked out of the query text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalContext {
    pub keywords: Vec<String>,
    pub mentioned_indicators: Vec<String>,
    pub mentioned_events: Vec<String>,
    pub price_levels: Vec<f64>,
}

/// Structured representation of a trading query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    /// Subject of the analysis
    pub pair: CurrencyPair,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub intent: UserIntent,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    /// Parser confidence in `[0, 1]`
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub additional: AdditionalContext,
    /// Set when the context came from the fallback matcher
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl QueryContext {
    /// Create a context for `pair` with default classification
    pub fn new(pair: CurrencyPair) -> Self {
        Self {
            pair,
            asset_type: AssetType::default(),
            timeframe: Timeframe::default(),
            intent: UserIntent::default(),
            risk_tolerance: RiskTolerance::default(),
            confidence: 0.5,
            additional: AdditionalContext::default(),
            parse_error: None,
        }
    }

    pub fn with_asset_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = asset_type;
        self
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_intent(mut self, intent: UserIntent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_risk_tolerance(mut self, risk_tolerance: RiskTolerance) -> Self {
        self.risk_tolerance = risk_tolerance;
        self
    }

    /// Set the confidence, clamped to `[0, 1]`
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_additional(mut self, additional: AdditionalContext) -> Self {
        self.additional = additional;
        self
    }

    /// Mark the context as produced by the fallback matcher
    pub fn with_parse_error(mut self, error: impl Into<String>) -> Self {
        self.parse_error = Some(error.into());
        self
    }

    /// Whether the fallback matcher produced this context
    pub fn is_fallback(&self) -> bool {
        self.parse_error.is_some()
    }
}
