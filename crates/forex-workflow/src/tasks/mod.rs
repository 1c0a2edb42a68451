//! Analysis tasks run concurrently by the [`TaskExecutor`](crate::TaskExecutor)
//!
//! Each task owns exactly one [`TaskKind`] and hence one slot of the state's
//! task results, so tasks never contend for the same field.

pub mod fundamental;
pub mod news;
pub mod technical;

pub use fundamental::FundamentalTask;
pub use news::NewsTask;
pub use technical::{TechnicalTask, placeholder_price};

use async_trait::async_trait;
use forex_core::{Error, Judgement, QueryContext, Result, TaskKind};

/// One independent unit of analysis work
#[async_trait]
pub trait AnalysisTask: Send + Sync {
    /// The slot this task fills
    fn kind(&self) -> TaskKind;

    /// Produce a judgement for `context`
    async fn run(&self, context: &QueryContext) -> Result<Judgement>;
}

/// Reject judgements whose payload belongs to another task
pub(crate) fn ensure_kind(expected: TaskKind, judgement: Judgement) -> Result<Judgement> {
    let actual = judgement.payload.kind();
    if actual == expected {
        Ok(judgement)
    } else {
        Err(Error::InvalidTaskResult(format!(
            "{expected} task received a {actual} payload"
        )))
    }
}
