//! Core abstractions for forex-agent-rs
//!
//! This crate defines the data model threaded through the analysis pipeline:
//! the parsed query context, per-task results, the risk assessment, the final
//! decision, and the append-only [`AnalysisState`] that collects them. It also
//! defines the provider traits that external reasoning backends implement.

pub mod context;
pub mod decision;
pub mod error;
pub mod market;
pub mod pair;
pub mod provider;
pub mod risk;
pub mod stage;
pub mod state;
pub mod task;

pub use context::{AdditionalContext, AssetType, QueryContext, RiskTolerance, Timeframe, UserIntent};
pub use decision::{Action, Decision, Reasoning, TradeParameters};
pub use error::{Error, Result};
pub use market::{HistoricalChange, MarketData, Ohlc, PriceQuote, Provenance};
pub use pair::CurrencyPair;
pub use provider::{
    AnalysisProvider, AnalysisRequest, DecisionSynthesizer, Judgement, QueryInterpreter,
    SynthesisDraft, SynthesisInput,
};
pub use risk::{Direction, RiskAssessment};
pub use stage::Stage;
pub use state::{AnalysisState, StateUpdate};
pub use task::{
    FundamentalJudgement, NewsJudgement, Sentiment, Signal, SourceCitation, TaskKind, TaskPayload,
    TaskResult, TaskResults, TechnicalJudgement,
};
