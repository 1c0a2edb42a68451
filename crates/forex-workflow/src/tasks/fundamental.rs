//! Fundamental outlook task

use std::sync::Arc;

use async_trait::async_trait;
use forex_core::{AnalysisProvider, AnalysisRequest, Judgement, QueryContext, Result, TaskKind};
use tracing::instrument;

use super::{AnalysisTask, ensure_kind};

/// Asks the provider for a macro / policy outlook on the pair
pub struct FundamentalTask {
    provider: Arc<dyn AnalysisProvider>,
}

impl FundamentalTask {
    pub fn new(provider: Arc<dyn AnalysisProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl AnalysisTask for FundamentalTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Fundamental
    }

    #[instrument(skip_all, fields(pair = %context.pair))]
    async fn run(&self, context: &QueryContext) -> Result<Judgement> {
        let request = AnalysisRequest::new(TaskKind::Fundamental, context.clone());
        let judgement = self.provider.analyze(&request).await?;
        ensure_kind(TaskKind::Fundamental, judgement)
    }
}
