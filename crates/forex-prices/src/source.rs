//! Upstream price source abstraction

use async_trait::async_trait;
use chrono::NaiveDate;
use forex_core::{CurrencyPair, Ohlc, PriceQuote};

use crate::error::Result;

/// One upstream provider of rates
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Source name for logging and quote attribution
    fn name(&self) -> &'static str;

    /// Latest quote for `pair`
    async fn fetch_current(&self, pair: &CurrencyPair) -> Result<PriceQuote>;

    /// Closing rate of `pair` on `date`
    async fn fetch_historical(&self, pair: &CurrencyPair, date: NaiveDate) -> Result<f64>;

    /// Daily bar of `pair` on `date`
    async fn fetch_ohlc(&self, pair: &CurrencyPair, date: NaiveDate) -> Result<Ohlc>;
}
