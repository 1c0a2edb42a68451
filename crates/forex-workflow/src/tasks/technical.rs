//! Technical analysis task
//!
//! Resolves a price before asking the provider for levels. When the price
//! service has nothing, a fixed placeholder price stands in and the result
//! is tagged [`Provenance::Mock`] so every later stage can tell.

use std::sync::Arc;

use async_trait::async_trait;
use forex_core::{
    AnalysisProvider, AnalysisRequest, CurrencyPair, Judgement, MarketData, QueryContext,
    Result, TaskKind, TaskPayload,
};
use forex_prices::PriceService;
use tracing::{debug, info, instrument, warn};

use super::{AnalysisTask, ensure_kind};

/// Midpoints of typical trading ranges, used when no live quote exists
const PLACEHOLDER_PRICES: &[(&str, &str, f64)] = &[
    ("EUR", "USD", 1.085),
    ("GBP", "USD", 1.25),
    ("USD", "JPY", 146.0),
    ("XAU", "USD", 2650.0),
    ("BTC", "USD", 95_000.0),
];

const DEFAULT_PLACEHOLDER_PRICE: f64 = 1.25;

/// Deterministic stand-in price for `pair`
pub fn placeholder_price(pair: &CurrencyPair) -> f64 {
    PLACEHOLDER_PRICES
        .iter()
        .find(|(base, quote, _)| pair.base() == *base && pair.quote() == *quote)
        .map_or(DEFAULT_PLACEHOLDER_PRICE, |(_, _, price)| *price)
}

/// Price-aware technical analysis
pub struct TechnicalTask {
    provider: Arc<dyn AnalysisProvider>,
    prices: Arc<PriceService>,
}

impl TechnicalTask {
    pub fn new(provider: Arc<dyn AnalysisProvider>, prices: Arc<PriceService>) -> Self {
        Self { provider, prices }
    }

    /// Live market data for `pair`, or a placeholder when none is available
    pub async fn resolve_market(&self, pair: &CurrencyPair) -> MarketData {
        let enriched = self.prices.get_enriched(pair).await;
        match enriched.market_data() {
            Some(market) => {
                info!(%pair, price = market.price, source = %market.source, "Using live price");
                market
            }
            None => {
                let price = placeholder_price(pair);
                warn!(
                    %pair,
                    price,
                    reason = enriched.quote.reason().unwrap_or("unknown"),
                    "Live price unavailable, using placeholder"
                );
                MarketData::mock(price)
            }
        }
    }
}

#[async_trait]
impl AnalysisTask for TechnicalTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Technical
    }

    #[instrument(skip_all, fields(pair = %context.pair))]
    async fn run(&self, context: &QueryContext) -> Result<Judgement> {
        let market = self.resolve_market(&context.pair).await;
        let request =
            AnalysisRequest::new(TaskKind::Technical, context.clone()).with_market(market.clone());

        let answer = self.provider.analyze(&request).await?;
        let mut judgement = ensure_kind(TaskKind::Technical, answer)?;
        if let TaskPayload::Technical(technical) = &mut judgement.payload {
            if (technical.current_price - market.price).abs() > f64::EPSILON {
                debug!(
                    reported = technical.current_price,
                    resolved = market.price,
                    "Replacing provider price with resolved price"
                );
            }
            technical.current_price = market.price;
            technical.price_provenance = market.provenance;
        }
        Ok(judgement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use forex_core::{Ohlc, PriceQuote, Provenance, Signal, TechnicalJudgement};
    use forex_prices::{PriceCache, PriceError, PriceSource};
    use std::time::Duration;

    struct Quotes(Option<f64>);

    #[async_trait]
    impl PriceSource for Quotes {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch_current(&self, pair: &CurrencyPair) -> forex_prices::Result<PriceQuote> {
            let price = self.0.ok_or(PriceError::MissingApiKey("static"))?;
            Ok(PriceQuote {
                pair: pair.clone(),
                price,
                bid: price,
                ask: price,
                timestamp: Utc::now(),
                source: "static".to_string(),
            })
        }

        async fn fetch_historical(
            &self,
            _pair: &CurrencyPair,
            _date: NaiveDate,
        ) -> forex_prices::Result<f64> {
            Err(PriceError::MissingApiKey("static"))
        }

        async fn fetch_ohlc(
            &self,
            _pair: &CurrencyPair,
            _date: NaiveDate,
        ) -> forex_prices::Result<Ohlc> {
            Err(PriceError::MissingApiKey("static"))
        }
    }

    fn prices(price: Option<f64>) -> Arc<PriceService> {
        let source = Arc::new(Quotes(price));
        Arc::new(PriceService::with_sources(
            source.clone(),
            source,
            PriceCache::new(Duration::from_secs(60)),
            Duration::from_secs(1),
        ))
    }

    /// Echoes the price it was given, but claims a different one
    struct Echo;

    #[async_trait]
    impl AnalysisProvider for Echo {
        async fn analyze(&self, request: &AnalysisRequest) -> Result<Judgement> {
            let price = request.market.as_ref().map_or(0.0, |m| m.price);
            Ok(Judgement::new(TaskPayload::Technical(TechnicalJudgement {
                current_price: 9.99,
                price_provenance: Provenance::Real,
                trend: "flat".to_string(),
                signal: Signal::Hold,
                support: price * 0.99,
                resistance: price * 1.01,
                stop_loss: Some(price * 0.995),
                take_profit: None,
                rsi: None,
                key_levels: Vec::new(),
                summary: String::new(),
            })))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn context(pair: &str) -> QueryContext {
        QueryContext::new(pair.parse().unwrap())
    }

    #[test]
    fn test_placeholder_table() {
        assert_eq!(placeholder_price(&"EUR/USD".parse().unwrap()), 1.085);
        assert_eq!(placeholder_price(&"USD/JPY".parse().unwrap()), 146.0);
        assert_eq!(placeholder_price(&"AUD/CAD".parse().unwrap()), 1.25);
    }

    #[tokio::test]
    async fn test_live_price_is_real() {
        let task = TechnicalTask::new(Arc::new(Echo), prices(Some(1.0921)));
        let judgement = task.run(&context("EUR/USD")).await.unwrap();
        let TaskPayload::Technical(t) = judgement.payload else {
            panic!("expected technical payload");
        };
        assert_eq!(t.current_price, 1.0921);
        assert_eq!(t.price_provenance, Provenance::Real);
    }

    #[tokio::test]
    async fn test_unavailable_price_is_mock() {
        let task = TechnicalTask::new(Arc::new(Echo), prices(None));
        let judgement = task.run(&context("GBP/USD")).await.unwrap();
        let TaskPayload::Technical(t) = judgement.payload else {
            panic!("expected technical payload");
        };
        // Provider claims Real at 9.99; the resolved placeholder wins
        assert_eq!(t.current_price, 1.25);
        assert_eq!(t.price_provenance, Provenance::Mock);
    }
}
