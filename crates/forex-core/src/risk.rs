//! Risk assessment produced by the risk gate

use std::fmt;

use serde::{Deserialize, Serialize};

/// Side of a proposed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[serde(alias = "buy", alias = "long")]
    Buy,
    #[serde(alias = "sell", alias = "short")]
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Self::Buy),
            "sell" | "short" => Ok(Self::Sell),
            other => Err(format!("unknown direction '{other}' (expected buy or sell)")),
        }
    }
}

/// Sizing and admissibility of a proposed trade
///
/// `approved` holds exactly when `rejection_reason` is `None`. Sizing fields
/// are filled in as far as the rules got before a rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub approved: bool,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    /// Standard lots
    pub position_size: f64,
    pub risk_pips: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_pips: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_reward_ratio: Option<f64>,
    /// Account currency at risk if the stop is hit
    pub dollar_risk: f64,
    /// Fraction of the balance at risk
    pub risk_fraction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RiskAssessment {
    /// One-line human readable verdict
    pub fn summary(&self) -> String {
        match &self.rejection_reason {
            None => format!(
                "Trade APPROVED: Position size {:.2} lots, risking ${:.2} ({:.1}% of account).",
                self.position_size,
                self.dollar_risk,
                self.risk_fraction * 100.0
            ),
            Some(reason) => format!("Trade REJECTED: {reason}"),
        }
    }
}
