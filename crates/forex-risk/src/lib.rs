//! Risk gate for forex-agent-rs
//!
//! The gate is the only component allowed to veto a run. Its core,
//! [`RiskGate::evaluate`], is a pure function of a [`TradeProposal`] and a
//! [`RiskConfig`]; contextual warnings are layered on afterwards by
//! [`enrich`] without changing the verdict.

pub mod config;
pub mod error;
pub mod gate;
pub mod warnings;

pub use config::{AccountConfig, RiskConfig, RiskConfigBuilder};
pub use error::{Result, RiskError};
pub use gate::{RiskGate, TradeProposal};
pub use warnings::enrich;
