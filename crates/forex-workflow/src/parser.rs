//! Query parsing
//!
//! A configured [`QueryInterpreter`] gets the first attempt. When there is
//! none, or it fails, the query is classified by keyword and pattern
//! matching instead. Parsing never fails: the worst case is the default
//! pair with the reason recorded on the context.

use std::sync::Arc;
use std::time::Duration;

use forex_core::{
    AdditionalContext, AssetType, CurrencyPair, QueryContext, QueryInterpreter, RiskTolerance,
    Timeframe, UserIntent,
};
use forex_prices::routing::{COMMODITY_SYMBOLS, CRYPTO_SYMBOLS, asset_type_of};
use regex::Regex;
use tracing::{debug, info, warn};

/// Confidence assigned to contexts produced by keyword matching
const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Bound on one interpreter call unless the pipeline sets its own
const DEFAULT_INTERPRET_TIMEOUT: Duration = Duration::from_secs(60);

/// Keyword tables for the fallback matcher
mod keywords {
    /// Asset names mapped to the pair they usually mean, checked in order
    pub const ASSETS: &[(&str, &str)] = &[
        ("gold", "XAU/USD"),
        ("silver", "XAG/USD"),
        ("oil", "CL/USD"),
        ("bitcoin", "BTC/USD"),
        ("btc", "BTC/USD"),
        ("ethereum", "ETH/USD"),
        ("eth", "ETH/USD"),
        ("euro", "EUR/USD"),
        ("pound", "GBP/USD"),
        ("sterling", "GBP/USD"),
        ("yen", "USD/JPY"),
    ];

    /// Fiat codes recognised in free text
    pub const CURRENCIES: &[&str] = &[
        "USD", "EUR", "GBP", "JPY", "CHF", "AUD", "NZD", "CAD", "SEK", "NOK", "DKK", "HKD",
        "SGD", "CNY", "CNH", "MXN", "ZAR", "TRY", "PLN", "HUF", "CZK", "INR", "KRW", "BRL",
    ];

    pub const MEDIUM_TERM: &[&str] = &["swing", "weekly", "week", "weeks", "medium"];
    pub const LONG_TERM: &[&str] = &[
        "long",
        "position",
        "monthly",
        "months",
        "invest",
        "investment",
    ];

    pub const BUY: &[&str] = &["buy", "long", "bullish", "go long"];
    pub const SELL: &[&str] = &["sell", "short", "bearish", "go short"];
    pub const OVERVIEW: &[&str] = &["happening", "overview", "outlook", "news", "update"];
    pub const RISK: &[&str] = &["risk", "risky", "safe", "exposure"];

    pub const CONSERVATIVE: &[&str] = &["conservative", "cautious", "careful", "low risk"];
    pub const AGGRESSIVE: &[&str] = &["aggressive", "high risk", "yolo"];

    pub const INDICATORS: &[&str] = &[
        "rsi", "macd", "sma", "ema", "bollinger", "fibonacci", "atr", "stochastic", "vwap",
    ];

    pub const EVENTS: &[&str] = &[
        "nfp", "cpi", "fomc", "fed", "ecb", "boe", "boj", "gdp", "payrolls", "inflation",
        "rate decision",
    ];
}

/// Outcome of parsing one query
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub context: QueryContext,
    /// Why the fallback matcher was used, if it was
    pub error: Option<String>,
}

/// Turns free-form queries into a [`QueryContext`]
#[derive(Clone)]
pub struct QueryParser {
    interpreter: Option<Arc<dyn QueryInterpreter>>,
    timeout: Duration,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self {
            interpreter: None,
            timeout: DEFAULT_INTERPRET_TIMEOUT,
        }
    }
}

impl QueryParser {
    /// Create a parser backed by `interpreter`
    pub fn new(interpreter: Arc<dyn QueryInterpreter>) -> Self {
        Self {
            interpreter: Some(interpreter),
            ..Self::default()
        }
    }

    /// Create a parser that only uses keyword matching
    pub fn keyword_only() -> Self {
        Self::default()
    }

    /// Give up on the interpreter after `timeout` and use keyword matching
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parse `query`, falling back to keyword matching on any failure
    pub async fn parse(&self, query: &str) -> ParsedQuery {
        let Some(interpreter) = &self.interpreter else {
            debug!("No query interpreter configured, using keyword matching");
            let error = "no query interpreter configured".to_string();
            return ParsedQuery {
                context: fallback_context(query, &error),
                error: Some(error),
            };
        };

        let interpreted = tokio::time::timeout(self.timeout, interpreter.interpret(query))
            .await
            .unwrap_or_else(|_| {
                Err(forex_core::Error::ProviderFailed(format!(
                    "query interpretation timed out after {}s",
                    self.timeout.as_secs_f64()
                )))
            });

        match interpreted {
            Ok(mut context) => {
                if context.asset_type == AssetType::Unknown {
                    context.asset_type = asset_type_of(&context.pair);
                }
                info!(
                    pair = %context.pair,
                    asset_type = ?context.asset_type,
                    intent = ?context.intent,
                    "Query interpreted"
                );
                ParsedQuery {
                    context,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Query interpretation failed, falling back to keyword matching");
                let error = e.to_string();
                ParsedQuery {
                    context: fallback_context(query, &error),
                    error: Some(error),
                }
            }
        }
    }
}

impl std::fmt::Debug for QueryParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryParser")
            .field("interpreter", &self.interpreter.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Build a context from keywords and patterns alone
pub fn fallback_context(query: &str, error: &str) -> QueryContext {
    let lower = query.to_lowercase();
    let words = words(&lower);
    let pair = fallback_pair(query);

    let keywords_found: Vec<String> = keywords::ASSETS
        .iter()
        .filter(|(kw, _)| words.contains(kw))
        .map(|(kw, _)| (*kw).to_string())
        .collect();

    let additional = AdditionalContext {
        keywords: keywords_found,
        mentioned_indicators: matching(&lower, &words, keywords::INDICATORS),
        mentioned_events: matching(&lower, &words, keywords::EVENTS),
        price_levels: price_levels(query),
    };

    let context = QueryContext::new(pair.clone())
        .with_asset_type(asset_type_of(&pair))
        .with_timeframe(timeframe(&lower, &words))
        .with_intent(intent(&lower, &words))
        .with_risk_tolerance(risk_tolerance(&lower, &words))
        .with_confidence(FALLBACK_CONFIDENCE)
        .with_additional(additional)
        .with_parse_error(error);

    info!(pair = %context.pair, "Query classified by keyword matching");
    context
}

/// Best-effort pair for `query`: an explicit pair if one is written out,
/// then a known asset name, then EUR/USD.
pub fn fallback_pair(query: &str) -> CurrencyPair {
    if let Some(pair) = explicit_pair(query) {
        return pair;
    }

    let lower = query.to_lowercase();
    let words = words(&lower);
    keywords::ASSETS
        .iter()
        .find(|(kw, _)| words.contains(kw))
        .and_then(|(_, pair)| pair.parse().ok())
        .unwrap_or_default()
}

fn is_code(s: &str) -> bool {
    keywords::CURRENCIES.contains(&s)
        || COMMODITY_SYMBOLS.contains(&s)
        || CRYPTO_SYMBOLS.contains(&s)
}

/// Find `EURUSD`, `EUR/USD`, `eur usd` style pairs made of known codes
fn explicit_pair(query: &str) -> Option<CurrencyPair> {
    let upper = query.to_uppercase();
    let tokens: Vec<&str> = upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        if token.len() == 6 {
            let (base, quote) = token.split_at(3);
            if is_code(base) && is_code(quote) {
                if let Ok(pair) = CurrencyPair::new(base, quote) {
                    return Some(pair);
                }
            }
        }
        if token.len() == 3 && is_code(token) {
            if let Some(next) = tokens.get(i + 1).filter(|n| n.len() == 3 && is_code(n)) {
                if let Ok(pair) = CurrencyPair::new(token, next) {
                    return Some(pair);
                }
            }
        }
    }
    None
}

fn words(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// A keyword matches as a whole word, or as a substring when it is a phrase
fn mentions(lower: &str, words: &[&str], keyword: &str) -> bool {
    if keyword.contains(' ') {
        lower.contains(keyword)
    } else {
        words.contains(&keyword)
    }
}

fn mentions_any(lower: &str, words: &[&str], keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| mentions(lower, words, kw))
}

fn matching(lower: &str, words: &[&str], keywords: &[&str]) -> Vec<String> {
    keywords
        .iter()
        .filter(|kw| mentions(lower, words, kw))
        .map(|kw| (*kw).to_string())
        .collect()
}

fn timeframe(lower: &str, words: &[&str]) -> Timeframe {
    if mentions_any(lower, words, keywords::LONG_TERM) {
        Timeframe::LongTerm
    } else if mentions_any(lower, words, keywords::MEDIUM_TERM) {
        Timeframe::MediumTerm
    } else {
        Timeframe::ShortTerm
    }
}

fn intent(lower: &str, words: &[&str]) -> UserIntent {
    let buy = mentions_any(lower, words, keywords::BUY);
    let sell = mentions_any(lower, words, keywords::SELL);
    match (buy, sell) {
        (true, false) => UserIntent::BuySignal,
        (false, true) => UserIntent::SellSignal,
        _ if mentions_any(lower, words, keywords::RISK) => UserIntent::RiskAssessment,
        _ if mentions_any(lower, words, keywords::OVERVIEW) => UserIntent::MarketOverview,
        _ => UserIntent::TradingSignal,
    }
}

fn risk_tolerance(lower: &str, words: &[&str]) -> RiskTolerance {
    if mentions_any(lower, words, keywords::CONSERVATIVE) {
        RiskTolerance::Conservative
    } else if mentions_any(lower, words, keywords::AGGRESSIVE) {
        RiskTolerance::Aggressive
    } else {
        RiskTolerance::Moderate
    }
}

/// Decimal numbers in the query, e.g. `1.0850` or `2650.5`
fn price_levels(query: &str) -> Vec<f64> {
    let Ok(pattern) = Regex::new(r"\b\d+\.\d+\b") else {
        return Vec::new();
    };
    pattern
        .find_iter(query)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}
