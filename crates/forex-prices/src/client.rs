//! HTTP client for the metalpriceapi.com / forexrateapi.com family
//!
//! Both services share one wire format. The key travels as the `api_key`
//! query parameter. The metals service is queried with the legs swapped
//! (`base=USD&currencies=XAU`), so its rate is inverted to get the price of
//! one unit of metal.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use forex_core::{CurrencyPair, Ohlc, PriceQuote};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::PriceConfig;
use crate::error::{PriceError, Result};
use crate::source::PriceSource;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Which rate API a client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateApi {
    /// metalpriceapi.com, precious metals
    MetalPrice,
    /// forexrateapi.com, currencies and crypto
    ForexRate,
}

impl RateApi {
    pub fn name(self) -> &'static str {
        match self {
            Self::MetalPrice => "metalpriceapi",
            Self::ForexRate => "forexrateapi",
        }
    }

    /// Synthetic bid/ask spread as a fraction of price
    fn spread_fraction(self) -> f64 {
        match self {
            Self::MetalPrice => 0.001,
            Self::ForexRate => 0.0002,
        }
    }

    fn decimals(self) -> i32 {
        match self {
            Self::MetalPrice => 2,
            Self::ForexRate => 5,
        }
    }

    /// Whether the service quotes the pair inverted
    fn inverted(self) -> bool {
        self == Self::MetalPrice
    }

    /// `(base, currencies)` query values for `pair`
    fn legs(self, pair: &CurrencyPair) -> (&str, &str) {
        if self.inverted() {
            (pair.quote(), pair.base())
        } else {
            (pair.base(), pair.quote())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    success: bool,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    rates: HashMap<String, f64>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OhlcResponse {
    success: bool,
    #[serde(default)]
    rate: Option<Ohlc>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

fn api_error(api: RateApi, error: Option<ApiErrorBody>) -> PriceError {
    let message = match error {
        Some(ApiErrorBody {
            info: Some(info), ..
        }) => info,
        Some(ApiErrorBody {
            code: Some(code), ..
        }) => format!("error code {code}"),
        _ => "request unsuccessful".to_string(),
    };
    PriceError::Api {
        provider: api.name(),
        message,
    }
}

/// Extract the price of one unit of `pair.base()` from a rates payload
fn rate_from(api: RateApi, pair: &CurrencyPair, response: &RatesResponse) -> Result<f64> {
    let (_, symbol) = api.legs(pair);
    let rate = response
        .rates
        .get(symbol)
        .copied()
        .filter(|r| r.is_finite() && *r > 0.0)
        .ok_or_else(|| PriceError::MissingRate {
            provider: api.name(),
            symbol: symbol.to_string(),
        })?;
    Ok(if api.inverted() { 1.0 / rate } else { rate })
}

fn quote_from(api: RateApi, pair: &CurrencyPair, response: RatesResponse) -> Result<PriceQuote> {
    if !response.success {
        return Err(api_error(api, response.error));
    }
    let price = rate_from(api, pair, &response)?;
    let half_spread = price * api.spread_fraction() / 2.0;
    let timestamp = response
        .timestamp
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    Ok(PriceQuote {
        pair: pair.clone(),
        price: round_to(price, api.decimals()),
        bid: round_to(price - half_spread, api.decimals()),
        ask: round_to(price + half_spread, api.decimals()),
        timestamp,
        source: api.name().to_string(),
    })
}

/// Rate API client
#[derive(Debug, Clone)]
pub struct RateApiClient {
    api: RateApi,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: SharedRateLimiter,
}

impl RateApiClient {
    /// Create a client for `api` using the key, URL, timeout and rate limit
    /// from `config`
    pub fn new(api: RateApi, config: &PriceConfig) -> Result<Self> {
        let (api_key, base_url) = match api {
            RateApi::MetalPrice => (config.metal_api_key.clone(), config.metal_base_url.clone()),
            RateApi::ForexRate => (config.forex_api_key.clone(), config.forex_base_url.clone()),
        };
        let client = Client::builder().timeout(config.request_timeout).build()?;

        let per_minute = NonZeroU32::new(config.rate_limit_per_minute)
            .ok_or_else(|| PriceError::Config("rate_limit_per_minute must be > 0".to_string()))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            api,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            rate_limiter,
        })
    }

    pub fn api(&self) -> RateApi {
        self.api
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(PriceError::MissingApiKey(self.api.name()))?;

        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{path}", self.base_url);
        debug!(provider = self.api.name(), %url, "Requesting rates");
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", api_key)])
            .query(params)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(PriceError::RateLimitExceeded {
                provider: self.api.name(),
            }),
            status if !status.is_success() => Err(PriceError::Api {
                provider: self.api.name(),
                message: format!("HTTP error: {status}"),
            }),
            _ => Ok(response.json().await?),
        }
    }

    async fn rates(&self, path: &str, pair: &CurrencyPair) -> Result<RatesResponse> {
        let (base, currencies) = self.api.legs(pair);
        self.get(path, &[("base", base), ("currencies", currencies)])
            .await
    }
}

#[async_trait]
impl PriceSource for RateApiClient {
    fn name(&self) -> &'static str {
        self.api.name()
    }

    #[instrument(skip(self), fields(provider = self.api.name()))]
    async fn fetch_current(&self, pair: &CurrencyPair) -> Result<PriceQuote> {
        let response = self.rates("latest", pair).await?;
        quote_from(self.api, pair, response)
    }

    #[instrument(skip(self), fields(provider = self.api.name()))]
    async fn fetch_historical(&self, pair: &CurrencyPair, date: NaiveDate) -> Result<f64> {
        let path = date.format("%Y-%m-%d").to_string();
        let response = self.rates(&path, pair).await?;
        if !response.success {
            return Err(api_error(self.api, response.error));
        }
        let rate = rate_from(self.api, pair, &response)?;
        Ok(round_to(rate, self.api.decimals()))
    }

    #[instrument(skip(self), fields(provider = self.api.name()))]
    async fn fetch_ohlc(&self, pair: &CurrencyPair, date: NaiveDate) -> Result<Ohlc> {
        let date = date.format("%Y-%m-%d").to_string();
        let response: OhlcResponse = self
            .get(
                "ohlc",
                &[("base", pair.base()), ("currency", pair.quote()), ("date", &date)],
            )
            .await?;
        if !response.success {
            return Err(api_error(self.api, response.error));
        }
        response.rate.ok_or_else(|| PriceError::MissingRate {
            provider: self.api.name(),
            symbol: pair.to_string(),
        })
    }
}
