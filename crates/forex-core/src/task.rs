//! Analysis task contract
//!
//! Every analysis task returns the same [`TaskResult`] envelope. The payload is
//! a tagged union with one variant per task kind, so consumers never have to
//! dig through loosely typed JSON for fields.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Direction, Error, Provenance, Result};

/// The fixed set of concurrent analysis tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    News,
    Technical,
    Fundamental,
}

impl TaskKind {
    /// All task kinds in merge order
    pub const ALL: [TaskKind; 3] = [TaskKind::News, TaskKind::Technical, TaskKind::Fundamental];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Technical => "technical",
            Self::Fundamental => "fundamental",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional market view used by news and fundamental judgements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    #[serde(alias = "positive", alias = "BULLISH")]
    Bullish,
    #[serde(alias = "negative", alias = "BEARISH")]
    Bearish,
    #[default]
    #[serde(alias = "mixed", alias = "NEUTRAL")]
    Neutral,
}

impl Sentiment {
    /// Trade direction this view favours, if any
    pub fn bias(self) -> Option<Direction> {
        match self {
            Self::Bullish => Some(Direction::Buy),
            Self::Bearish => Some(Direction::Sell),
            Self::Neutral => None,
        }
    }
}

/// Technical signal emitted by the technical task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    #[serde(alias = "buy")]
    Buy,
    #[serde(alias = "sell")]
    Sell,
    #[default]
    #[serde(alias = "hold", alias = "NEUTRAL", alias = "neutral")]
    Hold,
}

/// A source backing a judgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub title: String,
    pub url: String,
}

impl SourceCitation {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsJudgement {
    #[serde(default)]
    pub overall_sentiment: Sentiment,
    /// Sentiment strength in `[-1, 1]`
    #[serde(default)]
    pub sentiment_score: f64,
    #[serde(default)]
    pub key_events: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalJudgement {
    pub current_price: f64,
    /// Overwritten by the technical task with the provenance of the price it
    /// actually resolved
    #[serde(default = "default_provenance")]
    pub price_provenance: Provenance,
    #[serde(default)]
    pub trend: String,
    #[serde(default)]
    pub signal: Signal,
    pub support: f64,
    pub resistance: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub key_levels: Vec<f64>,
    #[serde(default)]
    pub summary: String,
}

fn default_provenance() -> Provenance {
    Provenance::Mock
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalJudgement {
    #[serde(default)]
    pub outlook: Sentiment,
    /// Policy rate of base minus quote, in percentage points
    #[serde(default)]
    pub rate_differential: Option<f64>,
    #[serde(default)]
    pub key_drivers: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// Task-specific payload of a successful result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskPayload {
    News(NewsJudgement),
    Technical(TechnicalJudgement),
    Fundamental(FundamentalJudgement),
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::News(_) => TaskKind::News,
            Self::Technical(_) => TaskKind::Technical,
            Self::Fundamental(_) => TaskKind::Fundamental,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            Self::News(n) => &n.summary,
            Self::Technical(t) => &t.summary,
            Self::Fundamental(f) => &f.summary,
        }
    }
}

/// Outcome of one analysis task
///
/// `success` holds exactly when `data` is present and `error` is absent, and
/// the payload variant always matches `task`. Use [`TaskResult::success`] and
/// [`TaskResult::failure`] to build values that uphold this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub task: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TaskPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceCitation>,
    /// Pipeline step that produced this result
    #[serde(default)]
    pub step: u32,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl TaskResult {
    pub fn success(payload: TaskPayload, sources: Vec<SourceCitation>) -> Self {
        Self {
            success: true,
            task: payload.kind(),
            data: Some(payload),
            error: None,
            sources,
            step: 0,
            elapsed_ms: 0,
        }
    }

    pub fn failure(task: TaskKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            task,
            data: None,
            error: Some(error.into()),
            sources: Vec::new(),
            step: 0,
            elapsed_ms: 0,
        }
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Check the envelope invariants
    pub fn validate(&self) -> Result<()> {
        match (&self.data, &self.error) {
            (Some(payload), None) if self.success => {
                if payload.kind() == self.task {
                    Ok(())
                } else {
                    Err(Error::InvalidTaskResult(format!(
                        "{} result carries a {} payload",
                        self.task,
                        payload.kind()
                    )))
                }
            }
            (None, Some(_)) if !self.success => Ok(()),
            _ => Err(Error::InvalidTaskResult(format!(
                "{} result has inconsistent success/data/error",
                self.task
            ))),
        }
    }

    pub fn news(&self) -> Option<&NewsJudgement> {
        match &self.data {
            Some(TaskPayload::News(n)) => Some(n),
            _ => None,
        }
    }

    pub fn technical(&self) -> Option<&TechnicalJudgement> {
        match &self.data {
            Some(TaskPayload::Technical(t)) => Some(t),
            _ => None,
        }
    }

    pub fn fundamental(&self) -> Option<&FundamentalJudgement> {
        match &self.data {
            Some(TaskPayload::Fundamental(f)) => Some(f),
            _ => None,
        }
    }
}

/// One write-once slot per task kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamental: Option<TaskResult>,
}

impl TaskResults {
    pub fn get(&self, kind: TaskKind) -> Option<&TaskResult> {
        match kind {
            TaskKind::News => self.news.as_ref(),
            TaskKind::Technical => self.technical.as_ref(),
            TaskKind::Fundamental => self.fundamental.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, kind: TaskKind) -> &mut Option<TaskResult> {
        match kind {
            TaskKind::News => &mut self.news,
            TaskKind::Technical => &mut self.technical,
            TaskKind::Fundamental => &mut self.fundamental,
        }
    }

    /// Populated results in [`TaskKind::ALL`] order
    pub fn iter(&self) -> impl Iterator<Item = &TaskResult> {
        TaskKind::ALL.into_iter().filter_map(|kind| self.get(kind))
    }

    /// Whether every task has settled, successfully or not
    pub fn all_settled(&self) -> bool {
        TaskKind::ALL
            .into_iter()
            .all(|kind| self.get(kind).is_some())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskResult> {
        self.iter().filter(|r| !r.success)
    }

    pub fn successful_count(&self) -> usize {
        self.iter().filter(|r| r.success).count()
    }
}
