//! Pipeline orchestration
//!
//! [`Pipeline`] drives one [`AnalysisState`] through its stages. Every stage
//! produces a [`StateUpdate`] that is merged into the state, and the next
//! stage is chosen by [`Stage::next`]. Nothing a provider does can abort a
//! run; only a configuration error or a broken state invariant ends it with
//! `Err`.

use std::sync::Arc;

use forex_core::{
    AnalysisProvider, AnalysisState, DecisionSynthesizer, Provenance, QueryInterpreter, Stage,
    StateUpdate, SynthesisInput,
};
use forex_prices::PriceService;
use forex_risk::{AccountConfig, RiskGate, TradeProposal, enrich};
use futures::Stream;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::events::{EventSink, PipelineEvent};
use crate::executor::TaskExecutor;
use crate::parser::QueryParser;
use crate::synthesis::synthesize;
use crate::tasks::{AnalysisTask, FundamentalTask, NewsTask, TechnicalTask};

/// Multi-stage trading analysis pipeline
///
/// Build one per process with [`Pipeline::builder`] and share it by `Arc`;
/// runs are independent and may proceed concurrently.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use forex_prices::{PriceConfig, PriceService};
/// use forex_workflow::{Pipeline, RuleBasedAnalyst};
///
/// # async fn example() -> forex_workflow::Result<()> {
/// let analyst = Arc::new(RuleBasedAnalyst::new());
/// let pipeline = Pipeline::builder()
///     .provider(analyst.clone())
///     .synthesizer(analyst)
///     .price_service(Arc::new(PriceService::new(&PriceConfig::from_env()?)?))
///     .build()?;
///
/// let state = pipeline.run("Should I sell EUR/USD?", None).await?;
/// println!("{}: {}", state.final_action(), state.explanation());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    parser: QueryParser,
    executor: TaskExecutor,
    synthesizer: Arc<dyn DecisionSynthesizer>,
    config: PipelineConfig,
    events: broadcast::Sender<PipelineEvent>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Receive the events of every run started after this call
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Run the pipeline for `query` to completion.
    ///
    /// `account` overrides the configured balance and risk fraction for
    /// this run only.
    pub async fn run(
        &self,
        query: impl Into<String>,
        account: Option<AccountConfig>,
    ) -> Result<AnalysisState> {
        let sink = EventSink::new(self.events.clone(), None);
        self.execute(query.into(), account, &sink).await
    }

    /// Run the pipeline in the background and stream its events.
    ///
    /// The stream ends after the `finished` or `failed` event. A consumer
    /// that falls more than `event_capacity` events behind misses
    /// intermediate events but always receives the terminal one.
    pub fn run_stream(
        self: &Arc<Self>,
        query: impl Into<String>,
        account: Option<AccountConfig>,
    ) -> impl Stream<Item = PipelineEvent> + Send + 'static {
        let (tx, rx) = mpsc::channel(self.config.event_capacity);
        let pipeline = Arc::clone(self);
        let query = query.into();

        tokio::spawn(async move {
            let sink = EventSink::new(pipeline.events.clone(), Some(tx));
            if let Err(e) = pipeline.execute(query, account, &sink).await {
                debug!(error = %e, "Streamed run ended with an error");
            }
        });

        futures::stream::unfold(rx, |mut rx| async move {
            let event = rx.recv().await?;
            Some((event, rx))
        })
    }

    #[instrument(skip_all, fields(query = %query))]
    async fn execute(
        &self,
        query: String,
        account: Option<AccountConfig>,
        sink: &EventSink,
    ) -> Result<AnalysisState> {
        // Fatal configuration problems surface before any stage runs
        let gate = match self.risk_gate(account.as_ref()) {
            Ok(gate) => gate,
            Err(e) => {
                error!(error = %e, "Run aborted by configuration error");
                sink.emit_final(PipelineEvent::Failed {
                    run_id: None,
                    error: e.to_string(),
                })
                .await;
                return Err(e);
            }
        };

        let mut state = AnalysisState::new(query);
        let run_id = state.run_id();
        info!(%run_id, "Pipeline run started");
        sink.emit(PipelineEvent::Started {
            run_id,
            query: state.query().to_string(),
        });

        match self.advance(&mut state, &gate, sink).await {
            Ok(()) => {
                let action = state.final_action();
                info!(
                    %run_id,
                    %action,
                    steps = state.step_count(),
                    errors = state.errors().len(),
                    "Pipeline run finished"
                );
                sink.emit_final(PipelineEvent::Finished {
                    run_id,
                    action,
                    step_count: state.step_count(),
                    explanation: state.explanation(),
                })
                .await;
                Ok(state)
            }
            Err(e) => {
                error!(%run_id, stage = %state.stage(), error = %e, "Pipeline run failed");
                sink.emit_final(PipelineEvent::Failed {
                    run_id: Some(run_id),
                    error: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    fn risk_gate(&self, account: Option<&AccountConfig>) -> Result<RiskGate> {
        self.config.validate()?;
        let risk = match account {
            Some(account) => self.config.risk.with_account(account)?,
            None => self.config.risk.clone(),
        };
        Ok(RiskGate::new(risk)?)
    }

    /// Drive `state` from parsing to termination
    async fn advance(
        &self,
        state: &mut AnalysisState,
        gate: &RiskGate,
        sink: &EventSink,
    ) -> Result<()> {
        let run_id = state.run_id();
        sink.emit(PipelineEvent::StageEntered {
            run_id,
            stage: state.stage(),
        });

        loop {
            match state.stage() {
                Stage::Parsing => self.parse(state, sink).await?,
                Stage::ParallelAnalysis => self.analyze(state, sink).await?,
                Stage::RiskGate => self.gate(state, gate, sink)?,
                Stage::Synthesis => self.synthesize(state, sink).await?,
                Stage::Terminated => return Ok(()),
            }

            let Some(next) = state.stage().next(state) else {
                return Err(PipelineError::State(forex_core::Error::InvariantViolation(
                    format!("stage {} completed without satisfying its exit guard", state.stage()),
                )));
            };
            state.enter(next)?;
            debug!(%run_id, stage = %next, "Entered stage");
            sink.emit(PipelineEvent::StageEntered {
                run_id,
                stage: next,
            });
        }
    }

    async fn parse(&self, state: &mut AnalysisState, sink: &EventSink) -> Result<()> {
        let parsed = self.parser.parse(state.query()).await;

        let mut update = StateUpdate::new()
            .with_context(parsed.context.clone())
            .with_step(state.step_count() + 1);
        if let Some(error) = parsed.error {
            update = update.with_error(AnalysisState::PARSER_ERROR_KEY, error);
        }
        state.merge(update)?;

        sink.emit(PipelineEvent::ContextParsed {
            run_id: state.run_id(),
            context: parsed.context,
        });
        Ok(())
    }

    async fn analyze(&self, state: &mut AnalysisState, sink: &EventSink) -> Result<()> {
        let Some(context) = state.context().cloned() else {
            return Err(PipelineError::State(forex_core::Error::InvariantViolation(
                "parallel analysis entered without a context".to_string(),
            )));
        };
        let outcome = self.executor.execute(&context, state.step_count()).await;

        let mut update = StateUpdate::new().with_step(outcome.step_count);
        for (key, message) in outcome.errors {
            update = update.with_error(key, message);
        }
        for result in &outcome.results {
            update = update.with_task_result(result.clone());
        }
        state.merge(update)?;

        for result in outcome.results {
            sink.emit(PipelineEvent::TaskCompleted {
                run_id: state.run_id(),
                result,
            });
        }
        Ok(())
    }

    fn gate(&self, state: &mut AnalysisState, gate: &RiskGate, sink: &EventSink) -> Result<()> {
        let Some(pair) = state.context().map(|c| c.pair.clone()) else {
            return Err(PipelineError::State(forex_core::Error::InvariantViolation(
                "risk gate entered without a context".to_string(),
            )));
        };
        let step = state.step_count() + 1;

        let proposal = TradeProposal::from_technical(
            pair,
            state.task_result(forex_core::TaskKind::Technical),
        );
        let event = match proposal {
            Ok(proposal) => {
                let assessment = enrich(
                    gate.evaluate(&proposal),
                    state.task_results(),
                    gate.config(),
                );
                if assessment.approved {
                    info!(
                        direction = %assessment.direction,
                        size = assessment.position_size,
                        warnings = assessment.warnings.len(),
                        "Trade approved by risk gate"
                    );
                } else {
                    warn!(
                        reason = assessment.rejection_reason.as_deref().unwrap_or_default(),
                        "Trade rejected by risk gate"
                    );
                }
                let update = StateUpdate::new().with_risk(assessment.clone());
                state.merge(update.with_step(step))?;
                PipelineEvent::RiskEvaluated {
                    run_id: state.run_id(),
                    approved: assessment.approved,
                    reason: assessment.rejection_reason.clone(),
                    assessment: Some(assessment),
                }
            }
            Err(e) => {
                warn!(error = %e, "Risk assessment could not be made");
                state.merge(
                    StateUpdate::new()
                        .with_error(AnalysisState::RISK_ERROR_KEY, e.to_string())
                        .with_step(step),
                )?;
                PipelineEvent::RiskEvaluated {
                    run_id: state.run_id(),
                    approved: false,
                    assessment: None,
                    reason: Some(e.to_string()),
                }
            }
        };
        sink.emit(event);
        Ok(())
    }

    async fn synthesize(&self, state: &mut AnalysisState, sink: &EventSink) -> Result<()> {
        let (Some(context), Some(risk)) = (state.context().cloned(), state.risk().cloned()) else {
            return Err(PipelineError::State(forex_core::Error::InvariantViolation(
                "synthesis entered without context and risk assessment".to_string(),
            )));
        };
        let input = SynthesisInput {
            query: state.query().to_string(),
            context,
            task_results: state.task_results().clone(),
            risk,
        };
        let provenance = state.price_provenance().unwrap_or(Provenance::Mock);

        let outcome = synthesize(
            self.synthesizer.as_ref(),
            &input,
            provenance,
            self.config.task_timeout,
        )
        .await;

        let mut update = StateUpdate::new()
            .with_decision(outcome.decision.clone())
            .with_step(state.step_count() + 1);
        if let Some(error) = outcome.error {
            update = update.with_error(AnalysisState::SYNTHESIS_ERROR_KEY, error);
        }
        state.merge(update)?;

        sink.emit(PipelineEvent::DecisionMade {
            run_id: state.run_id(),
            decision: outcome.decision,
        });
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("parser", &self.parser)
            .field("executor", &self.executor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Pipeline`]
#[derive(Default)]
pub struct PipelineBuilder {
    interpreter: Option<Arc<dyn QueryInterpreter>>,
    provider: Option<Arc<dyn AnalysisProvider>>,
    prices: Option<Arc<PriceService>>,
    synthesizer: Option<Arc<dyn DecisionSynthesizer>>,
    tasks: Vec<Arc<dyn AnalysisTask>>,
    config: Option<PipelineConfig>,
}

impl PipelineBuilder {
    /// Interpreter used for parsing; without one, keyword matching is used
    pub fn interpreter(mut self, interpreter: Arc<dyn QueryInterpreter>) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    /// Provider behind the news, technical and fundamental tasks
    pub fn provider(mut self, provider: Arc<dyn AnalysisProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Price service used by the technical task
    pub fn price_service(mut self, prices: Arc<PriceService>) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn DecisionSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Use `task` in place of the default task of the same kind
    pub fn task(mut self, task: Arc<dyn AnalysisTask>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let synthesizer = self
            .synthesizer
            .ok_or(PipelineError::MissingComponent("synthesizer"))?;

        let mut tasks: Vec<Arc<dyn AnalysisTask>> = Vec::new();
        if let Some(provider) = &self.provider {
            tasks.push(Arc::new(NewsTask::new(provider.clone())));
            tasks.push(Arc::new(FundamentalTask::new(provider.clone())));
            if let Some(prices) = &self.prices {
                let technical = TechnicalTask::new(provider.clone(), prices.clone());
                tasks.push(Arc::new(technical));
            }
        }
        // Explicit tasks come last so they replace the defaults
        tasks.extend(self.tasks);

        let executor = TaskExecutor::new(tasks, config.task_timeout, config.stage_timeout);
        let covered = executor.kinds();
        if let Some(missing) = forex_core::TaskKind::ALL
            .into_iter()
            .find(|kind| !covered.contains(kind))
        {
            return Err(PipelineError::MissingComponent(match missing {
                forex_core::TaskKind::News | forex_core::TaskKind::Fundamental => {
                    "analysis provider"
                }
                forex_core::TaskKind::Technical if self.provider.is_some() => "price service",
                forex_core::TaskKind::Technical => "analysis provider",
            }));
        }

        let parser = match self.interpreter {
            Some(interpreter) => QueryParser::new(interpreter).with_timeout(config.task_timeout),
            None => QueryParser::keyword_only(),
        };
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Pipeline {
            parser,
            executor,
            synthesizer,
            config,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forex_core::{
        Action, Judgement, QueryContext, Reasoning, SynthesisDraft, TaskKind,
    };

    struct Waiting;

    #[async_trait]
    impl DecisionSynthesizer for Waiting {
        async fn synthesize(&self, _input: &SynthesisInput) -> forex_core::Result<SynthesisDraft> {
            Ok(SynthesisDraft {
                action: Action::Wait,
                confidence: 0.5,
                reasoning: Reasoning::new("wait"),
            })
        }
    }

    struct Failing(TaskKind);

    #[async_trait]
    impl AnalysisTask for Failing {
        fn kind(&self) -> TaskKind {
            self.0
        }

        async fn run(&self, _context: &QueryContext) -> forex_core::Result<Judgement> {
            let reason = format!("{} offline", self.0);
            Err(forex_core::Error::ProviderFailed(reason))
        }
    }

    fn all_failing() -> PipelineBuilder {
        Pipeline::builder()
            .synthesizer(Arc::new(Waiting))
            .task(Arc::new(Failing(TaskKind::News)))
            .task(Arc::new(Failing(TaskKind::Technical)))
            .task(Arc::new(Failing(TaskKind::Fundamental)))
    }

    #[test]
    fn test_builder_requires_components() {
        assert!(matches!(
            Pipeline::builder().build(),
            Err(PipelineError::MissingComponent("synthesizer"))
        ));
        assert!(matches!(
            Pipeline::builder().synthesizer(Arc::new(Waiting)).build(),
            Err(PipelineError::MissingComponent("analysis provider"))
        ));
        assert!(all_failing().build().is_ok());
    }

    #[tokio::test]
    async fn test_all_tasks_failing_terminates_with_wait() {
        let pipeline = all_failing().build().unwrap();
        let state = pipeline.run("gold", None).await.unwrap();

        assert_eq!(state.stage(), Stage::Terminated);
        assert_eq!(state.final_action(), Action::Wait);
        assert!(state.risk().is_none());
        assert!(state.errors().contains_key(AnalysisState::RISK_ERROR_KEY));
        assert!(state.errors().contains_key(AnalysisState::PARSER_ERROR_KEY));
        assert_eq!(state.failed_tasks().len(), 3);
        assert!(state.explanation().starts_with("No trade recommended"));
    }

    #[tokio::test]
    async fn test_invalid_account_fails_before_any_stage() {
        let pipeline = all_failing().build().unwrap();
        let mut events = pipeline.subscribe();

        let err = pipeline
            .run("EUR/USD", Some(AccountConfig::new(-5.0, 0.02)))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Risk(_)));

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind(), "failed");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribers_see_stage_order() {
        let pipeline = all_failing().build().unwrap();
        let mut events = pipeline.subscribe();
        pipeline.run("EUR/USD", None).await.unwrap();

        let mut stages = Vec::new();
        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let PipelineEvent::StageEntered { stage, .. } = &event {
                stages.push(*stage);
            }
            kinds.push(event.kind());
        }
        assert_eq!(
            stages,
            vec![
                Stage::Parsing,
                Stage::ParallelAnalysis,
                Stage::RiskGate,
                Stage::Terminated
            ]
        );
        assert_eq!(kinds.first(), Some(&"started"));
        assert_eq!(kinds.last(), Some(&"finished"));
        assert_eq!(kinds.iter().filter(|k| **k == "task_completed").count(), 3);
    }
}
