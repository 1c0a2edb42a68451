//! Progress events published while a run advances
//!
//! Each event carries only what the step just produced, never the whole
//! state, so observers can forward them cheaply. Delivery is best effort:
//! nobody listening, or a listener that falls behind, never slows a run.

use forex_core::{Action, Decision, QueryContext, RiskAssessment, Stage, TaskResult};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

/// One step of progress in a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        run_id: Uuid,
        query: String,
    },
    StageEntered {
        run_id: Uuid,
        stage: Stage,
    },
    ContextParsed {
        run_id: Uuid,
        context: QueryContext,
    },
    TaskCompleted {
        run_id: Uuid,
        result: TaskResult,
    },
    RiskEvaluated {
        run_id: Uuid,
        approved: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assessment: Option<RiskAssessment>,
        /// Rejection reason, or why no assessment could be made
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    DecisionMade {
        run_id: Uuid,
        decision: Decision,
    },
    Finished {
        run_id: Uuid,
        action: Action,
        step_count: u32,
        explanation: String,
    },
    Failed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run_id: Option<Uuid>,
        error: String,
    },
}

impl PipelineEvent {
    /// Short name of the event kind, as used in the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::StageEntered { .. } => "stage_entered",
            Self::ContextParsed { .. } => "context_parsed",
            Self::TaskCompleted { .. } => "task_completed",
            Self::RiskEvaluated { .. } => "risk_evaluated",
            Self::DecisionMade { .. } => "decision_made",
            Self::Finished { .. } => "finished",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether no further events follow for this run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }
}

/// Fans events out to process-wide subscribers and, for streamed runs, to
/// the run's own bounded channel
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    broadcast: broadcast::Sender<PipelineEvent>,
    stream: Option<mpsc::Sender<PipelineEvent>>,
}

impl EventSink {
    pub(crate) fn new(
        broadcast: broadcast::Sender<PipelineEvent>,
        stream: Option<mpsc::Sender<PipelineEvent>>,
    ) -> Self {
        Self { broadcast, stream }
    }

    /// Publish without waiting; events no one can take right now are dropped
    pub(crate) fn emit(&self, event: PipelineEvent) {
        // Err only means there are no subscribers
        let _ = self.broadcast.send(event.clone());

        if let Some(stream) = &self.stream {
            if let Err(e) = stream.try_send(event) {
                debug!(event = e.into_inner().kind(), "Stream consumer lagging, event dropped");
            }
        }
    }

    /// Publish a terminal event, waiting for room in the run's stream
    pub(crate) async fn emit_final(&self, event: PipelineEvent) {
        let _ = self.broadcast.send(event.clone());

        if let Some(stream) = &self.stream {
            // Err means the consumer went away
            let _ = stream.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let run_id = Uuid::new_v4();
        let event = PipelineEvent::RiskEvaluated {
            run_id,
            approved: false,
            assessment: None,
            reason: Some("Risk too small".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "risk_evaluated");
        assert_eq!(json["approved"], false);
        assert!(json.get("assessment").is_none());

        let back: PipelineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_kind_matches_tag() {
        let event = PipelineEvent::StageEntered {
            run_id: Uuid::new_v4(),
            stage: Stage::RiskGate,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["stage"], "risk_gate");
        assert!(!event.is_terminal());
    }

    #[tokio::test]
    async fn test_full_stream_drops_instead_of_blocking() {
        let (broadcast, _) = broadcast::channel(4);
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(broadcast, Some(tx));

        let failed = |error: &str| PipelineEvent::Failed {
            run_id: None,
            error: error.to_string(),
        };
        sink.emit(failed("first"));
        sink.emit(failed("second"));

        assert_eq!(rx.recv().await, Some(failed("first")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let (broadcast, _) = broadcast::channel(4);
        EventSink::new(broadcast, None).emit(PipelineEvent::Failed {
            run_id: None,
            error: "nobody listening".to_string(),
        });
    }
}
