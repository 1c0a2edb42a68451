//! Analysis pipeline for forex-agent-rs
//!
//! A run moves through a fixed sequence of stages:
//!
//! 1. **Parsing**: the free-form query becomes a [`QueryContext`](forex_core::QueryContext),
//!    by an interpreter when one is configured, otherwise by keyword matching.
//! 2. **Parallel analysis**: news, technical and fundamental tasks run
//!    concurrently on a [`TaskExecutor`]; each settles into its own slot.
//! 3. **Risk gate**: the technical levels are sized and vetted by
//!    [`forex_risk::RiskGate`]. A rejection ends the run with WAIT.
//! 4. **Synthesis**: an approved trade is turned into a final
//!    [`Decision`](forex_core::Decision).
//!
//! [`Pipeline`] drives the stages and publishes [`PipelineEvent`]s as it goes.

pub mod analyst;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod parser;
pub mod pipeline;
pub mod synthesis;
pub mod tasks;

pub use analyst::{LlmAnalyst, RuleBasedAnalyst};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{PipelineError, Result};
pub use events::PipelineEvent;
pub use executor::{ExecutionOutcome, TaskExecutor};
pub use parser::QueryParser;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use tasks::{AnalysisTask, FundamentalTask, NewsTask, TechnicalTask};
