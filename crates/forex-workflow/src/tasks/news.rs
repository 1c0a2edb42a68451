//! News sentiment task

use std::sync::Arc;

use async_trait::async_trait;
use forex_core::{AnalysisProvider, AnalysisRequest, Judgement, QueryContext, Result, TaskKind};
use tracing::{debug, instrument};

use super::{AnalysisTask, ensure_kind};

/// Asks the provider for a news sentiment judgement
pub struct NewsTask {
    provider: Arc<dyn AnalysisProvider>,
}

impl NewsTask {
    pub fn new(provider: Arc<dyn AnalysisProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl AnalysisTask for NewsTask {
    fn kind(&self) -> TaskKind {
        TaskKind::News
    }

    #[instrument(skip_all, fields(pair = %context.pair))]
    async fn run(&self, context: &QueryContext) -> Result<Judgement> {
        let request = AnalysisRequest::new(TaskKind::News, context.clone());
        let judgement = self.provider.analyze(&request).await?;
        debug!(sources = judgement.sources.len(), "News judgement received");
        ensure_kind(TaskKind::News, judgement)
    }
}
