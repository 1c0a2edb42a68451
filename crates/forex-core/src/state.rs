//! Append-only analysis state
//!
//! [`AnalysisState`] is built exclusively by merging [`StateUpdate`]s. Every
//! field except the step counter and the error map is write-once: a merge that
//! would overwrite a populated field is rejected and leaves the state as it
//! was. Concurrent tasks therefore never race, since each owns one disjoint
//! slot of [`TaskResults`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    Action, Decision, Error, Provenance, QueryContext, Result, RiskAssessment, Stage, TaskKind,
    TaskResult, TaskResults,
};

/// Partial update produced by one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub context: Option<QueryContext>,
    pub task_results: Vec<TaskResult>,
    pub risk: Option<RiskAssessment>,
    pub decision: Option<Decision>,
    pub step_count: Option<u32>,
    pub errors: BTreeMap<String, String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: QueryContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_task_result(mut self, result: TaskResult) -> Self {
        self.task_results.push(result);
        self
    }

    pub fn with_risk(mut self, risk: RiskAssessment) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.step_count = Some(step);
        self
    }

    pub fn with_error(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        append_error(&mut self.errors, key.into(), message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn append_error(errors: &mut BTreeMap<String, String>, key: String, message: String) {
    errors
        .entry(key)
        .and_modify(|existing| {
            existing.push_str("; ");
            existing.push_str(&message);
        })
        .or_insert(message);
}

/// The record threaded through one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisState {
    run_id: Uuid,
    query: String,
    started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<QueryContext>,
    task_results: TaskResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk: Option<RiskAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<Decision>,
    step_count: u32,
    errors: BTreeMap<String, String>,
    stage: Stage,
}

impl AnalysisState {
    /// Error key recorded when the risk computation itself failed
    pub const RISK_ERROR_KEY: &'static str = "risk";
    /// Error key recorded when synthesis fell back to WAIT
    pub const SYNTHESIS_ERROR_KEY: &'static str = "synthesis";
    /// Error key recorded when query parsing fell back to pattern matching
    pub const PARSER_ERROR_KEY: &'static str = "query_parser";
    /// Error key recorded when fan-out degraded to sequential execution
    pub const PARALLEL_ERROR_KEY: &'static str = "parallel_execution";

    pub fn new(query: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query: query.into(),
            started_at: Utc::now(),
            context: None,
            task_results: TaskResults::default(),
            risk: None,
            decision: None,
            step_count: 0,
            errors: BTreeMap::new(),
            stage: Stage::Parsing,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn context(&self) -> Option<&QueryContext> {
        self.context.as_ref()
    }

    pub fn task_results(&self) -> &TaskResults {
        &self.task_results
    }

    pub fn task_result(&self, kind: TaskKind) -> Option<&TaskResult> {
        self.task_results.get(kind)
    }

    pub fn risk(&self) -> Option<&RiskAssessment> {
        self.risk.as_ref()
    }

    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Merge a partial update.
    ///
    /// The update is checked as a whole before anything is applied, so a
    /// rejected merge leaves the state untouched.
    pub fn merge(&mut self, update: StateUpdate) -> Result<()> {
        if let Err(e) = self.check(&update) {
            warn!(
                run_id = %self.run_id,
                stage = %self.stage,
                error = %e,
                "Rejected state update"
            );
            return Err(e);
        }

        let StateUpdate {
            context,
            task_results,
            risk,
            decision,
            step_count,
            errors,
        } = update;

        if context.is_some() {
            self.context = context;
        }
        for result in task_results {
            let kind = result.task;
            *self.task_results.slot_mut(kind) = Some(result);
        }
        if risk.is_some() {
            self.risk = risk;
        }
        if decision.is_some() {
            self.decision = decision;
        }
        if let Some(step) = step_count {
            self.step_count = self.step_count.max(step);
        }
        for (key, message) in errors {
            append_error(&mut self.errors, key, message);
        }
        Ok(())
    }

    fn check(&self, update: &StateUpdate) -> Result<()> {
        if update.context.is_some() && self.context.is_some() {
            return Err(Error::FieldAlreadySet("context".to_string()));
        }

        let mut seen = Vec::with_capacity(update.task_results.len());
        for result in &update.task_results {
            result.validate()?;
            if seen.contains(&result.task) || self.task_results.get(result.task).is_some() {
                let field = format!("task_results.{}", result.task);
                return Err(Error::FieldAlreadySet(field));
            }
            seen.push(result.task);
        }

        if update.risk.is_some() && self.risk.is_some() {
            return Err(Error::FieldAlreadySet("risk".to_string()));
        }

        if let Some(decision) = &update.decision {
            if self.decision.is_some() {
                return Err(Error::FieldAlreadySet("decision".to_string()));
            }
            if !decision.is_consistent() {
                return Err(Error::InvariantViolation(
                    "decision carries trade parameters inconsistent with its action".to_string(),
                ));
            }
            let approved = update
                .risk
                .as_ref()
                .or(self.risk.as_ref())
                .is_some_and(|risk| risk.approved);
            if !approved {
                return Err(Error::InvariantViolation(
                    "a decision requires an approved risk assessment".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Advance to `stage`, provided the current stage's guard allows it
    pub fn enter(&mut self, stage: Stage) -> Result<()> {
        match self.stage.next(self) {
            Some(next) if next == stage => {
                debug!(
                    run_id = %self.run_id,
                    from = %self.stage,
                    to = %stage,
                    "Stage transition"
                );
                self.stage = stage;
                Ok(())
            }
            expected => {
                warn!(
                    run_id = %self.run_id,
                    from = %self.stage,
                    requested = %stage,
                    ?expected,
                    "Rejected stage transition"
                );
                Err(Error::InvariantViolation(format!(
                    "cannot move from {} to {stage}",
                    self.stage
                )))
            }
        }
    }

    /// The action the run ended with; WAIT unless synthesis produced a trade
    pub fn final_action(&self) -> Action {
        self.decision.as_ref().map_or(Action::Wait, |d| d.action)
    }

    /// Provenance of the price the technical task worked from
    pub fn price_provenance(&self) -> Option<Provenance> {
        self.task_results
            .technical
            .as_ref()
            .and_then(TaskResult::technical)
            .map(|t| t.price_provenance)
    }

    /// Failed tasks paired with their error messages
    pub fn failed_tasks(&self) -> Vec<(TaskKind, &str)> {
        self.task_results
            .failed()
            .map(|r| (r.task, r.error.as_deref().unwrap_or("unknown error")))
            .collect()
    }

    /// Human readable reason for the final action
    pub fn explanation(&self) -> String {
        if let Some(decision) = &self.decision {
            return decision.reasoning.summary.clone();
        }

        let mut parts = Vec::new();
        if let Some(risk) = &self.risk {
            if let Some(reason) = &risk.rejection_reason {
                parts.push(format!("rejected by risk gate: {reason}"));
            }
        }
        if let Some(err) = self.errors.get(Self::RISK_ERROR_KEY) {
            parts.push(format!("risk assessment failed: {err}"));
        }
        for (kind, err) in self.failed_tasks() {
            parts.push(format!("{kind} analysis failed: {err}"));
        }

        if parts.is_empty() {
            "No decision was produced".to_string()
        } else {
            format!("No trade recommended: {}", parts.join("; "))
        }
    }
}
