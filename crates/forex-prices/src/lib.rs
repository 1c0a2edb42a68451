//! Price data service for forex-agent-rs
//!
//! Quotes are resolved from one of two upstream rate APIs, chosen by a static
//! routing table, and kept in a TTL cache shared by every consumer in the
//! process. Lookups never fail: an upstream error or timeout becomes
//! [`Lookup::Unavailable`], which callers handle as an ordinary outcome.

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod routing;
pub mod service;
pub mod source;

pub use cache::{CacheStats, PriceCache};
pub use client::{RateApi, RateApiClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PriceConfig, PriceConfigBuilder};
pub use error::{PriceError, Result};
pub use routing::{AssetClass, COMMODITY_SYMBOLS};
pub use service::{EnrichedQuote, Lookup, PriceService, previous_trading_day};
pub use source::PriceSource;
