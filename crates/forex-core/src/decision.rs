//! Final trading decision

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Direction, Provenance};

/// Recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    #[serde(alias = "buy")]
    Buy,
    #[serde(alias = "sell")]
    Sell,
    #[serde(alias = "wait", alias = "HOLD", alias = "hold")]
    Wait,
}

impl Action {
    /// Trade direction, `None` for WAIT
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Buy => Some(Direction::Buy),
            Self::Sell => Some(Direction::Sell),
            Self::Wait => None,
        }
    }
}

impl From<Direction> for Action {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Buy => Self::Buy,
            Direction::Sell => Self::Sell,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
            Self::Wait => f.write_str("WAIT"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reasoning {
    pub summary: String,
    pub key_factors: Vec<String>,
    pub risks: Vec<String>,
}

impl Reasoning {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }
}

/// Concrete order parameters of a BUY or SELL decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeParameters {
    pub entry_price: f64,
    pub stop_loss: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    pub position_size: f64,
    /// Whether `entry_price` came from a live quote or a placeholder
    pub price_provenance: Provenance,
}

/// Final output of the synthesis stage
///
/// `trade_parameters` is present exactly when `action` is not WAIT, and
/// `confidence` always lies in `[0, 1]`. Both hold for values built through
/// [`Decision::trade`] and [`Decision::wait`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub confidence: f64,
    pub reasoning: Reasoning,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_parameters: Option<TradeParameters>,
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl Decision {
    /// A BUY or SELL decision with its order parameters
    pub fn trade(
        direction: Direction,
        confidence: f64,
        reasoning: Reasoning,
        parameters: TradeParameters,
    ) -> Self {
        Self {
            action: direction.into(),
            confidence: clamp_confidence(confidence),
            reasoning,
            trade_parameters: Some(parameters),
        }
    }

    /// A WAIT decision; never carries order parameters
    pub fn wait(confidence: f64, reasoning: Reasoning) -> Self {
        Self {
            action: Action::Wait,
            confidence: clamp_confidence(confidence),
            reasoning,
            trade_parameters: None,
        }
    }

    /// Whether the decision upholds its invariants
    pub fn is_consistent(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
            && (self.action == Action::Wait) == self.trade_parameters.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TradeParameters {
        TradeParameters {
            entry_price: 1.0845,
            stop_loss: 1.0910,
            take_profit: None,
            position_size: 0.31,
            price_provenance: Provenance::Real,
        }
    }

    #[test]
    fn test_trade_decision() {
        let decision = Decision::trade(Direction::Sell, 1.4, Reasoning::new("bearish"), params());
        assert_eq!(decision.action, Action::Sell);
        assert_eq!(decision.confidence, 1.0);
        assert!(decision.is_consistent());
    }

    #[test]
    fn test_wait_decision() {
        let decision = Decision::wait(-1.0, Reasoning::new("nothing to do"));
        assert_eq!(decision.action, Action::Wait);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.trade_parameters.is_none());
        assert!(decision.is_consistent());
    }

    #[test]
    fn test_inconsistent_decision_detected() {
        let mut decision = Decision::wait(0.5, Reasoning::default());
        decision.trade_parameters = Some(params());
        assert!(!decision.is_consistent());
    }

    #[test]
    fn test_action_serde() {
        let action: Action = serde_json::from_str("\"hold\"").unwrap();
        assert_eq!(action, Action::Wait);
        assert_eq!(serde_json::to_string(&Action::Buy).unwrap(), "\"BUY\"");
    }
}
