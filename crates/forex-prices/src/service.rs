//! Price data service: routing, caching and enrichment

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc, Weekday};
use forex_core::{
    CurrencyPair, HistoricalChange, MarketData, Ohlc, PriceQuote, Provenance,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::PriceCache;
use crate::client::{RateApi, RateApiClient};
use crate::config::PriceConfig;
use crate::error::{PriceError, Result};
use crate::routing::AssetClass;
use crate::source::PriceSource;

/// Outcome of a lookup that is allowed to come back empty
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Lookup<T> {
    Available(T),
    /// Upstream failed or timed out; carries the reason
    Unavailable(String),
}

impl<T> Lookup<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn available(self) -> Option<T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    pub fn as_ref(&self) -> Lookup<&T> {
        match self {
            Self::Available(value) => Lookup::Available(value),
            Self::Unavailable(reason) => Lookup::Unavailable(reason.clone()),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available(_) => None,
            Self::Unavailable(reason) => Some(reason),
        }
    }
}

/// Current quote plus previous-session context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedQuote {
    pub pair: CurrencyPair,
    pub quote: Lookup<PriceQuote>,
    /// Date the historical and OHLC lookups refer to
    pub reference_date: NaiveDate,
    pub previous_close: Lookup<f64>,
    pub ohlc: Lookup<Ohlc>,
    /// Present when both the quote and the previous close are available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<HistoricalChange>,
}

impl EnrichedQuote {
    /// Market data for the technical task, `None` when no live quote exists
    pub fn market_data(&self) -> Option<MarketData> {
        self.quote.value().map(|quote| MarketData {
            price: quote.price,
            provenance: Provenance::Real,
            source: quote.source.clone(),
            change: self.change,
            ohlc: self.ohlc.value().copied(),
        })
    }
}

/// Most recent weekday strictly before `date`
pub fn previous_trading_day(date: NaiveDate) -> NaiveDate {
    let mut day = date.pred_opt().unwrap_or(date);
    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        day = day.pred_opt().unwrap_or(day);
    }
    day
}

/// Multi-source price lookup with a shared TTL cache.
///
/// Build one per process and share it by `Arc`; every clone of the cache
/// handle points at the same map.
pub struct PriceService {
    metal: Arc<dyn PriceSource>,
    forex: Arc<dyn PriceSource>,
    cache: PriceCache,
    timeout: Duration,
}

impl PriceService {
    /// Create a service talking to the real rate APIs
    pub fn new(config: &PriceConfig) -> Result<Self> {
        config.validate()?;
        let metal = RateApiClient::new(RateApi::MetalPrice, config)?;
        let forex = RateApiClient::new(RateApi::ForexRate, config)?;
        Ok(Self::with_sources(
            Arc::new(metal),
            Arc::new(forex),
            PriceCache::new(config.cache_ttl),
            config.request_timeout,
        ))
    }

    /// Create a service from explicit sources and cache
    pub fn with_sources(
        metal: Arc<dyn PriceSource>,
        forex: Arc<dyn PriceSource>,
        cache: PriceCache,
        timeout: Duration,
    ) -> Self {
        Self {
            metal,
            forex,
            cache,
            timeout,
        }
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    fn source_for(&self, pair: &CurrencyPair) -> &dyn PriceSource {
        match AssetClass::of(pair) {
            AssetClass::Commodity => self.metal.as_ref(),
            AssetClass::Currency => self.forex.as_ref(),
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| PriceError::Timeout(self.timeout))?
    }

    fn settle<T>(pair: &CurrencyPair, what: &str, source: &str, result: Result<T>) -> Lookup<T> {
        match result {
            Ok(value) => Lookup::Available(value),
            Err(e) => {
                warn!(%pair, source, error = %e, "{what} lookup unavailable");
                Lookup::Unavailable(e.to_string())
            }
        }
    }

    /// Current quote, served from cache while fresh
    pub async fn get(&self, pair: &CurrencyPair) -> Lookup<PriceQuote> {
        let source = self.source_for(pair);
        let result = self
            .cache
            .get_or_fetch(pair, || self.bounded(source.fetch_current(pair)))
            .await;
        Self::settle(pair, "Quote", source.name(), result)
    }

    /// Rate of `pair` on `date`
    pub async fn get_historical(&self, pair: &CurrencyPair, date: NaiveDate) -> Lookup<f64> {
        let source = self.source_for(pair);
        let result = self.bounded(source.fetch_historical(pair, date)).await;
        Self::settle(pair, "Historical", source.name(), result)
    }

    /// Daily bar of `pair` on `date`
    pub async fn get_ohlc(&self, pair: &CurrencyPair, date: NaiveDate) -> Lookup<Ohlc> {
        let source = self.source_for(pair);
        let result = self.bounded(source.fetch_ohlc(pair, date)).await;
        Self::settle(pair, "OHLC", source.name(), result)
    }

    /// Quote enriched with the previous trading day's close and bar
    pub async fn get_enriched(&self, pair: &CurrencyPair) -> EnrichedQuote {
        self.get_enriched_on(pair, Utc::now().date_naive()).await
    }

    /// [`get_enriched`](Self::get_enriched) relative to `today`.
    ///
    /// The three lookups run concurrently and fail independently.
    pub async fn get_enriched_on(&self, pair: &CurrencyPair, today: NaiveDate) -> EnrichedQuote {
        let reference_date = previous_trading_day(today);
        let (quote, previous_close, ohlc) = tokio::join!(
            self.get(pair),
            self.get_historical(pair, reference_date),
            self.get_ohlc(pair, reference_date),
        );

        let change = match (quote.value(), previous_close.value()) {
            (Some(q), Some(prev)) => HistoricalChange::between(q.price, *prev),
            _ => None,
        };
        debug!(
            %pair,
            quote = quote.is_available(),
            previous_close = previous_close.is_available(),
            ohlc = ohlc.is_available(),
            "Enriched quote resolved"
        );

        EnrichedQuote {
            pair: pair.clone(),
            quote,
            reference_date,
            previous_close,
            ohlc,
            change,
        }
    }
}

impl std::fmt::Debug for PriceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceService")
            .field("metal", &self.metal.name())
            .field("forex", &self.forex.name())
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .finish()
    }
}
