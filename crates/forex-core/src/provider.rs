//! Capability boundary to external reasoning providers
//!
//! The pipeline never produces judgements itself. It hands a subject and
//! context to these traits and only relies on the typed contracts below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    Action, MarketData, QueryContext, Reasoning, Result, RiskAssessment, SourceCitation,
    TaskKind, TaskPayload, TaskResults,
};

/// Input to one analysis task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub task: TaskKind,
    pub context: QueryContext,
    /// Resolved price context, only supplied to the technical task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<MarketData>,
}

impl AnalysisRequest {
    pub fn new(task: TaskKind, context: QueryContext) -> Self {
        Self {
            task,
            context,
            market: None,
        }
    }

    pub fn with_market(mut self, market: MarketData) -> Self {
        self.market = Some(market);
        self
    }
}

/// Structured judgement returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    pub payload: TaskPayload,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
}

impl Judgement {
    pub fn new(payload: TaskPayload) -> Self {
        Self {
            payload,
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceCitation>) -> Self {
        self.sources = sources;
        self
    }
}

/// Produces news, technical and fundamental judgements
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Analyze the request's subject for the requested task.
    ///
    /// The returned payload variant must match `request.task`.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Judgement>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Turns a free-form query into a [`QueryContext`]
#[async_trait]
pub trait QueryInterpreter: Send + Sync {
    async fn interpret(&self, query: &str) -> Result<QueryContext>;
}

/// Everything synthesis gets to see
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisInput {
    pub query: String,
    pub context: QueryContext,
    pub task_results: TaskResults,
    pub risk: RiskAssessment,
}

/// Provider proposal before the pipeline attaches trade parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisDraft {
    pub action: Action,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Reasoning,
}

/// Combines task results and an approved risk assessment into a decision
#[async_trait]
pub trait DecisionSynthesizer: Send + Sync {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<SynthesisDraft>;
}
