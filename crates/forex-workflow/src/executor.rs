//! Concurrent task execution
//!
//! [`TaskExecutor::execute`] fans the analysis tasks out onto a
//! [`JoinSet`] and waits for all of them to settle. A task that errors or
//! times out settles as a failed [`TaskResult`]; the others are unaffected.
//! Only when the fan-out itself breaks (a task panics or is cancelled) are
//! all tasks re-run one after another, once.

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use forex_core::{AnalysisState, Judgement, QueryContext, TaskKind, TaskResult};
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, error, info, warn};

use crate::tasks::AnalysisTask;

/// Everything the parallel analysis stage produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// One result per task, in [`TaskKind::ALL`] order
    pub results: Vec<TaskResult>,
    /// Error messages keyed by task name, plus `parallel_execution` when
    /// the sequential fallback ran
    pub errors: BTreeMap<String, String>,
    pub step_count: u32,
    /// Whether the sequential fallback ran
    pub degraded: bool,
}

/// Runs analysis tasks concurrently with per-task and per-stage deadlines
#[derive(Clone)]
pub struct TaskExecutor {
    tasks: Vec<Arc<dyn AnalysisTask>>,
    task_timeout: Duration,
    stage_timeout: Duration,
}

type Settled = (TaskKind, Result<forex_core::Result<Judgement>, Duration>, Duration);

const STAGE_DEADLINE_EXCEEDED: &str = "stage deadline exceeded";

impl TaskExecutor {
    /// Create an executor over `tasks`.
    ///
    /// Tasks are keyed by [`AnalysisTask::kind`]; a later task replaces an
    /// earlier one of the same kind.
    pub fn new(
        tasks: Vec<Arc<dyn AnalysisTask>>,
        task_timeout: Duration,
        stage_timeout: Duration,
    ) -> Self {
        let mut by_kind: BTreeMap<TaskKind, Arc<dyn AnalysisTask>> = BTreeMap::new();
        for task in tasks {
            by_kind.insert(task.kind(), task);
        }
        Self {
            tasks: by_kind.into_values().collect(),
            task_timeout,
            stage_timeout,
        }
    }

    /// Kinds this executor has a task for
    pub fn kinds(&self) -> Vec<TaskKind> {
        self.tasks.iter().map(|t| t.kind()).collect()
    }

    /// Run every task for `context`.
    ///
    /// Never fails: each task settles into a [`TaskResult`], and kinds with
    /// no registered task settle as failures too. Every result carries step
    /// `base_step + 1`.
    pub async fn execute(&self, context: &QueryContext, base_step: u32) -> ExecutionOutcome {
        let step = base_step + 1;
        let deadline = Instant::now() + self.stage_timeout;
        info!(pair = %context.pair, tasks = self.tasks.len(), "Starting parallel analysis");

        let outcome = match self.fan_out(context, deadline).await {
            Ok(settled) => self.collect(settled, step, false, None),
            Err(cause) => {
                warn!(%cause, "Parallel execution failed, retrying tasks sequentially");
                let settled = self.sequential(context, deadline).await;
                self.collect(settled, step, true, Some(cause))
            }
        };

        info!(
            succeeded = outcome.results.iter().filter(|r| r.success).count(),
            failed = outcome.results.iter().filter(|r| !r.success).count(),
            degraded = outcome.degraded,
            "Parallel analysis settled"
        );
        outcome
    }

    /// Spawn all tasks and wait for them until `deadline`.
    ///
    /// Returns `Err` with the join failure when a task panicked or was
    /// cancelled; the remaining tasks are aborted in that case.
    async fn fan_out(
        &self,
        context: &QueryContext,
        deadline: Instant,
    ) -> Result<HashMap<TaskKind, TaskResult>, String> {
        let mut set: JoinSet<Settled> = JoinSet::new();
        for task in &self.tasks {
            let task = Arc::clone(task);
            let context = context.clone();
            let task_timeout = self.task_timeout;
            set.spawn(async move {
                let started = Instant::now();
                let result = timeout(task_timeout, task.run(&context))
                    .await
                    .map_err(|_| task_timeout);
                (task.kind(), result, started.elapsed())
            });
        }

        let mut settled = HashMap::new();
        loop {
            match timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((kind, result, elapsed)))) => {
                    settled.insert(kind, settle(kind, result, elapsed));
                }
                Ok(Some(Err(join_error))) => {
                    error!(error = %join_error, "Analysis task did not complete");
                    set.shutdown().await;
                    return Err(join_error.to_string());
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = set.len(),
                        deadline = ?self.stage_timeout,
                        "Stage deadline exceeded, aborting unsettled tasks"
                    );
                    set.shutdown().await;
                    for task in &self.tasks {
                        settled
                            .entry(task.kind())
                            .or_insert_with(|| self.past_deadline(task.kind()));
                    }
                    break;
                }
            }
        }
        Ok(settled)
    }

    /// Run the tasks one after another, each guarded by its timeout and
    /// isolated from panics. The retry shares the stage deadline of the
    /// failed fan-out; tasks it cannot reach settle as past the deadline.
    async fn sequential(
        &self,
        context: &QueryContext,
        deadline: Instant,
    ) -> HashMap<TaskKind, TaskResult> {
        let mut settled = HashMap::new();
        for task in &self.tasks {
            let kind = task.kind();
            let started = Instant::now();
            let guarded = AssertUnwindSafe(timeout(self.task_timeout, task.run(context)))
                .catch_unwind();
            let result = match timeout_at(deadline, guarded).await {
                Ok(Ok(result)) => {
                    let result = result.map_err(|_| self.task_timeout);
                    settle(kind, result, started.elapsed())
                }
                Ok(Err(_)) => {
                    error!(task = %kind, "Analysis task panicked during sequential retry");
                    TaskResult::failure(kind, "task panicked").with_elapsed(started.elapsed())
                }
                Err(_) => {
                    warn!(task = %kind, "Stage deadline reached during sequential retry");
                    self.past_deadline(kind)
                }
            };
            settled.insert(kind, result);
        }
        settled
    }

    fn past_deadline(&self, kind: TaskKind) -> TaskResult {
        TaskResult::failure(kind, STAGE_DEADLINE_EXCEEDED).with_elapsed(self.stage_timeout)
    }

    fn collect(
        &self,
        mut settled: HashMap<TaskKind, TaskResult>,
        step: u32,
        degraded: bool,
        cause: Option<String>,
    ) -> ExecutionOutcome {
        let mut errors = BTreeMap::new();
        if let Some(cause) = cause {
            errors.insert(
                AnalysisState::PARALLEL_ERROR_KEY.to_string(),
                format!("fell back to sequential execution: {cause}"),
            );
        }

        let results = TaskKind::ALL
            .into_iter()
            .map(|kind| {
                let result = settled
                    .remove(&kind)
                    .unwrap_or_else(|| TaskResult::failure(kind, "no task registered"))
                    .with_step(step);
                if let Some(err) = &result.error {
                    errors.insert(kind.to_string(), err.clone());
                }
                result
            })
            .collect();

        ExecutionOutcome {
            results,
            errors,
            step_count: step,
            degraded,
        }
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("tasks", &self.kinds())
            .field("task_timeout", &self.task_timeout)
            .field("stage_timeout", &self.stage_timeout)
            .finish()
    }
}

/// Turn one task's outcome into its result envelope
fn settle(
    kind: TaskKind,
    result: Result<forex_core::Result<Judgement>, Duration>,
    elapsed: Duration,
) -> TaskResult {
    let result = match result {
        Ok(Ok(judgement)) if judgement.payload.kind() == kind => {
            debug!(task = %kind, ?elapsed, "Task succeeded");
            TaskResult::success(judgement.payload, judgement.sources)
        }
        Ok(Ok(judgement)) => {
            warn!(
                task = %kind,
                payload = %judgement.payload.kind(),
                "Task returned a mismatched payload"
            );
            TaskResult::failure(
                kind,
                format!("{kind} task returned a {} payload", judgement.payload.kind()),
            )
        }
        Ok(Err(e)) => {
            warn!(task = %kind, error = %e, "Task failed");
            TaskResult::failure(kind, e.to_string())
        }
        Err(limit) => {
            warn!(task = %kind, ?limit, "Task timed out");
            TaskResult::failure(kind, format!("timed out after {}s", limit.as_secs_f64()))
        }
    };
    result.with_elapsed(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forex_core::{
        Error, FundamentalJudgement, NewsJudgement, Sentiment, Signal, TaskPayload,
        TechnicalJudgement,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload(kind: TaskKind) -> TaskPayload {
        match kind {
            TaskKind::News => TaskPayload::News(NewsJudgement {
                overall_sentiment: Sentiment::Neutral,
                sentiment_score: 0.0,
                key_events: Vec::new(),
                summary: "news".to_string(),
            }),
            TaskKind::Technical => TaskPayload::Technical(TechnicalJudgement {
                current_price: 1.0845,
                price_provenance: forex_core::Provenance::Real,
                trend: String::new(),
                signal: Signal::Hold,
                support: 1.08,
                resistance: 1.09,
                stop_loss: None,
                take_profit: None,
                rsi: None,
                key_levels: Vec::new(),
                summary: "technical".to_string(),
            }),
            TaskKind::Fundamental => TaskPayload::Fundamental(FundamentalJudgement {
                outlook: Sentiment::Neutral,
                rate_differential: None,
                key_drivers: Vec::new(),
                summary: "fundamental".to_string(),
            }),
        }
    }

    enum Behaviour {
        Succeed,
        Fail,
        Sleep(Duration),
        Panic,
        /// Panic on the first call, then succeed after the delay
        PanicOnce(AtomicUsize, Duration),
    }

    struct Fake {
        kind: TaskKind,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl Fake {
        fn new(kind: TaskKind, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                kind,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AnalysisTask for Fake {
        fn kind(&self) -> TaskKind {
            self.kind
        }

        async fn run(&self, _context: &QueryContext) -> forex_core::Result<Judgement> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Succeed => Ok(Judgement::new(payload(self.kind))),
                Behaviour::Fail => Err(Error::ProviderFailed("upstream 503".to_string())),
                Behaviour::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(Judgement::new(payload(self.kind)))
                }
                Behaviour::Panic => panic!("provider blew up"),
                Behaviour::PanicOnce(seen, delay) => {
                    if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("transient panic");
                    }
                    tokio::time::sleep(*delay).await;
                    Ok(Judgement::new(payload(self.kind)))
                }
            }
        }
    }

    fn context() -> QueryContext {
        QueryContext::new("EUR/USD".parse().unwrap())
    }

    fn executor(tasks: Vec<Arc<dyn AnalysisTask>>) -> TaskExecutor {
        TaskExecutor::new(tasks, Duration::from_secs(5), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_all_tasks_succeed() {
        let exec = executor(vec![
            Fake::new(TaskKind::Fundamental, Behaviour::Succeed),
            Fake::new(TaskKind::News, Behaviour::Succeed),
            Fake::new(TaskKind::Technical, Behaviour::Succeed),
        ]);
        let outcome = exec.execute(&context(), 1).await;

        let kinds: Vec<_> = outcome.results.iter().map(|r| r.task).collect();
        assert_eq!(kinds, TaskKind::ALL.to_vec());
        assert!(outcome.results.iter().all(|r| r.success && r.step == 2));
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.step_count, 2);
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_others() {
        let exec = executor(vec![
            Fake::new(TaskKind::News, Behaviour::Fail),
            Fake::new(TaskKind::Technical, Behaviour::Succeed),
            Fake::new(TaskKind::Fundamental, Behaviour::Succeed),
        ]);
        let outcome = exec.execute(&context(), 0).await;

        assert!(!outcome.results[0].success);
        let error = outcome.results[0].error.as_deref().unwrap();
        assert!(error.contains("upstream 503"), "{error}");
        assert!(outcome.results[1].success);
        assert!(outcome.results[2].success);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors.contains_key("news"));
        assert!(!outcome.degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_timeout() {
        let exec = TaskExecutor::new(
            vec![
                Fake::new(TaskKind::News, Behaviour::Sleep(Duration::from_secs(30))),
                Fake::new(TaskKind::Technical, Behaviour::Succeed),
                Fake::new(TaskKind::Fundamental, Behaviour::Succeed),
            ],
            Duration::from_secs(1),
            Duration::from_secs(60),
        );
        let outcome = exec.execute(&context(), 0).await;

        assert!(!outcome.results[0].success);
        let error = outcome.results[0].error.as_deref().unwrap();
        assert!(error.contains("timed out"), "{error}");
        assert_eq!(outcome.results.iter().filter(|r| r.success).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_deadline_aborts_stragglers() {
        let thirty = Duration::from_secs(30);
        let exec = TaskExecutor::new(
            vec![
                Fake::new(TaskKind::News, Behaviour::Sleep(thirty)),
                Fake::new(TaskKind::Technical, Behaviour::Succeed),
                Fake::new(TaskKind::Fundamental, Behaviour::Sleep(thirty)),
            ],
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        let outcome = exec.execute(&context(), 0).await;

        assert_eq!(
            outcome.results[0].error.as_deref(),
            Some("stage deadline exceeded")
        );
        assert!(outcome.results[1].success);
        assert_eq!(
            outcome.results[2].error.as_deref(),
            Some("stage deadline exceeded")
        );
    }

    #[tokio::test]
    async fn test_panic_triggers_sequential_retry() {
        let news = Fake::new(
            TaskKind::News,
            Behaviour::PanicOnce(AtomicUsize::new(0), Duration::ZERO),
        );
        let technical = Fake::new(TaskKind::Technical, Behaviour::Succeed);
        let fundamental = Fake::new(TaskKind::Fundamental, Behaviour::Succeed);
        let exec = executor(vec![news.clone(), technical.clone(), fundamental.clone()]);

        let outcome = exec.execute(&context(), 3).await;

        assert!(outcome.degraded);
        assert!(outcome.results.iter().all(|r| r.success && r.step == 4));
        let cause = &outcome.errors[AnalysisState::PARALLEL_ERROR_KEY];
        assert!(cause.contains("sequential"), "{cause}");
        assert_eq!(news.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_retry_keeps_stage_deadline() {
        let nine = Duration::from_secs(9);
        let exec = TaskExecutor::new(
            vec![
                Fake::new(
                    TaskKind::News,
                    Behaviour::PanicOnce(AtomicUsize::new(0), nine),
                ),
                Fake::new(TaskKind::Technical, Behaviour::Sleep(nine)),
                Fake::new(TaskKind::Fundamental, Behaviour::Sleep(nine)),
            ],
            Duration::from_secs(10),
            Duration::from_secs(15),
        );

        let started = Instant::now();
        let outcome = exec.execute(&context(), 0).await;

        assert!(outcome.degraded);
        assert!(started.elapsed() <= Duration::from_secs(15));
        assert!(outcome.results[0].success);
        assert_eq!(
            outcome.results[1].error.as_deref(),
            Some(STAGE_DEADLINE_EXCEEDED)
        );
        assert_eq!(
            outcome.results[2].error.as_deref(),
            Some(STAGE_DEADLINE_EXCEEDED)
        );
        assert!(outcome.errors.contains_key("fundamental"));
    }

    #[tokio::test]
    async fn test_persistent_panic_settles_as_failure() {
        let exec = executor(vec![
            Fake::new(TaskKind::News, Behaviour::Succeed),
            Fake::new(TaskKind::Technical, Behaviour::Panic),
            Fake::new(TaskKind::Fundamental, Behaviour::Succeed),
        ]);
        let outcome = exec.execute(&context(), 0).await;

        assert!(outcome.degraded);
        assert_eq!(outcome.results[1].error.as_deref(), Some("task panicked"));
        assert!(outcome.results[0].success);
        assert!(outcome.results[2].success);
        assert!(outcome.errors.contains_key("technical"));
    }

    #[tokio::test]
    async fn test_missing_task_settles_as_failure() {
        let exec = executor(vec![Fake::new(TaskKind::News, Behaviour::Succeed)]);
        let outcome = exec.execute(&context(), 0).await;
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.results[1].error.as_deref(), Some("no task registered"));
    }
}
