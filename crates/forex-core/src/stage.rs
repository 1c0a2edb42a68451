//! Pipeline stages and their transition guards

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AnalysisState;

/// Stages of one analysis run
///
/// ```text
/// Parsing -> ParallelAnalysis -> RiskGate -> Synthesis -> Terminated
///                                        \-> Terminated
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Parsing,
    ParallelAnalysis,
    RiskGate,
    Synthesis,
    Terminated,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::ParallelAnalysis => "parallel_analysis",
            Self::RiskGate => "risk_gate",
            Self::Synthesis => "synthesis",
            Self::Terminated => "terminated",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Terminated
    }

    /// The stage that follows `self` given `state`, or `None` while the
    /// current stage's exit guard does not hold yet.
    pub fn next(self, state: &AnalysisState) -> Option<Stage> {
        match self {
            Self::Parsing => state.context().is_some().then_some(Self::ParallelAnalysis),
            Self::ParallelAnalysis => state
                .task_results()
                .all_settled()
                .then_some(Self::RiskGate),
            Self::RiskGate => match state.risk() {
                Some(risk) if risk.approved => Some(Self::Synthesis),
                Some(_) => Some(Self::Terminated),
                None if state.errors().contains_key(AnalysisState::RISK_ERROR_KEY) => {
                    Some(Self::Terminated)
                }
                None => None,
            },
            Self::Synthesis => state.decision().is_some().then_some(Self::Terminated),
            Self::Terminated => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
