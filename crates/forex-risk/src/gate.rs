//! Position sizing and trade admissibility
//!
//! Rules, applied in order:
//!
//! 1. Signed stop distance must be positive (stop on the protective side).
//! 2. Stop distance must be at least `min_risk_pips`.
//! 3. Stop distance must be at most `max_risk_pips`.
//! 4. Size the position so a stopped-out trade loses `balance * fraction`.
//! 5. With a take-profit, the target must sit on the profit side and the
//!    reward/risk ratio must reach `min_risk_reward_ratio`.

use forex_core::{CurrencyPair, Direction, RiskAssessment, Signal, TaskResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RiskConfig;
use crate::error::{Result, RiskError};

/// A trade the gate is asked to vet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub pair: CurrencyPair,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
}

impl TradeProposal {
    /// Derive a proposal from the technical task's result.
    ///
    /// The entry is the technical task's current price. A HOLD signal has no
    /// direction of its own, so the side is inferred from where the stop sits:
    /// a stop below entry protects a long, a stop above protects a short.
    pub fn from_technical(pair: CurrencyPair, technical: Option<&TaskResult>) -> Result<Self> {
        let result = technical
            .ok_or_else(|| RiskError::TechnicalUnavailable("no technical result".to_string()))?;
        if !result.success {
            return Err(RiskError::TechnicalUnavailable(
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "technical task failed".to_string()),
            ));
        }
        let judgement = result.technical().ok_or_else(|| {
            RiskError::TechnicalUnavailable("result carries no technical payload".to_string())
        })?;

        let entry_price = judgement.current_price;
        if !(entry_price.is_finite() && entry_price > 0.0) {
            return Err(RiskError::MissingLevel("current_price"));
        }
        let stop_loss = judgement
            .stop_loss
            .filter(|s| s.is_finite() && *s > 0.0)
            .ok_or(RiskError::MissingLevel("stop_loss"))?;

        let direction = match judgement.signal {
            Signal::Buy => Direction::Buy,
            Signal::Sell => Direction::Sell,
            Signal::Hold if stop_loss < entry_price => Direction::Buy,
            Signal::Hold => Direction::Sell,
        };

        Ok(Self {
            pair,
            direction,
            entry_price,
            stop_loss,
            take_profit: judgement
                .take_profit
                .filter(|tp| tp.is_finite() && *tp > 0.0),
        })
    }
}

/// Slack on the pip and ratio boundaries; absorbs representation noise
/// such as `9.999999999998` pips and nothing more.
const BOUNDARY_TOLERANCE: f64 = 1e-6;

/// Reported pips are rounded to a tenth of a pip. Checks use raw values.
fn round_pips(pips: f64) -> f64 {
    (pips * 10.0).round() / 10.0
}

/// Stateless evaluator of the risk rules
#[derive(Debug, Clone)]
pub struct RiskGate {
    config: RiskConfig,
}

impl RiskGate {
    /// Create a gate; fails if the configuration is invalid
    pub fn new(config: RiskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Evaluate `proposal` against the configured rules.
    ///
    /// Deterministic and free of side effects: the same proposal always
    /// yields the same assessment.
    pub fn evaluate(&self, proposal: &TradeProposal) -> RiskAssessment {
        let config = &self.config;
        let scale = config.pip_scale(&proposal.pair);
        let signed_risk = match proposal.direction {
            Direction::Buy => proposal.entry_price - proposal.stop_loss,
            Direction::Sell => proposal.stop_loss - proposal.entry_price,
        };
        let raw_risk = signed_risk * scale;
        let risk_pips = round_pips(raw_risk);

        let mut assessment = RiskAssessment {
            approved: false,
            direction: proposal.direction,
            entry_price: proposal.entry_price,
            stop_loss: proposal.stop_loss,
            take_profit: proposal.take_profit,
            position_size: 0.0,
            risk_pips,
            reward_pips: None,
            risk_reward_ratio: None,
            dollar_risk: 0.0,
            risk_fraction: config.max_risk_fraction,
            rejection_reason: None,
            warnings: Vec::new(),
        };

        let reject = |mut assessment: RiskAssessment, reason: String| {
            info!(
                pair = %proposal.pair,
                direction = %proposal.direction,
                %reason,
                "Trade rejected by risk gate"
            );
            assessment.rejection_reason = Some(reason);
            assessment
        };

        if !raw_risk.is_finite() || raw_risk <= 0.0 {
            return reject(
                assessment,
                format!(
                    "Invalid stop loss: risk in pips must be positive \
                     (stop {} is on the wrong side of {} entry {})",
                    proposal.stop_loss, proposal.direction, proposal.entry_price
                ),
            );
        }
        if raw_risk + BOUNDARY_TOLERANCE < config.min_risk_pips {
            return reject(
                assessment,
                format!(
                    "Risk too small: {raw_risk:.2} pips is below minimum of {} pips",
                    config.min_risk_pips
                ),
            );
        }
        if raw_risk - BOUNDARY_TOLERANCE > config.max_risk_pips {
            return reject(
                assessment,
                format!(
                    "Risk too high: {raw_risk:.2} pips exceeds maximum of {} pips",
                    config.max_risk_pips
                ),
            );
        }

        assessment.dollar_risk = config.dollar_risk();
        assessment.position_size = assessment.dollar_risk / (raw_risk * config.pip_value);

        if let Some(take_profit) = proposal.take_profit {
            let signed_reward = match proposal.direction {
                Direction::Buy => take_profit - proposal.entry_price,
                Direction::Sell => proposal.entry_price - take_profit,
            };
            let raw_reward = signed_reward.abs() * scale;
            let ratio = raw_reward / raw_risk;
            assessment.reward_pips = Some(round_pips(raw_reward));
            assessment.risk_reward_ratio = Some(ratio);

            if signed_reward <= 0.0 {
                return reject(
                    assessment,
                    format!(
                        "Invalid take profit: {take_profit} is on the wrong side of {} entry {}",
                        proposal.direction, proposal.entry_price
                    ),
                );
            }
            if ratio + BOUNDARY_TOLERANCE < config.min_risk_reward_ratio {
                return reject(
                    assessment,
                    format!(
                        "Poor risk/reward ratio: {ratio:.2} is below minimum of {}",
                        config.min_risk_reward_ratio
                    ),
                );
            }
        }

        debug!(
            pair = %proposal.pair,
            risk_pips,
            position_size = assessment.position_size,
            "Trade approved by risk gate"
        );
        assessment.approved = true;
        assessment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forex_core::{Provenance, TaskKind, TaskPayload, TechnicalJudgement};

    fn eurusd() -> CurrencyPair {
        CurrencyPair::new("EUR", "USD").unwrap()
    }

    fn gate() -> RiskGate {
        RiskGate::new(RiskConfig::default()).unwrap()
    }

    fn proposal(direction: Direction, entry: f64, stop: f64, tp: Option<f64>) -> TradeProposal {
        TradeProposal {
            pair: eurusd(),
            direction,
            entry_price: entry,
            stop_loss: stop,
            take_profit: tp,
        }
    }

    fn technical(signal: Signal, price: f64, stop: Option<f64>, tp: Option<f64>) -> TaskResult {
        TaskResult::success(
            TaskPayload::Technical(TechnicalJudgement {
                current_price: price,
                price_provenance: Provenance::Real,
                trend: "sideways".to_string(),
                signal,
                support: price * 0.99,
                resistance: price * 1.01,
                stop_loss: stop,
                take_profit: tp,
                rsi: None,
                key_levels: Vec::new(),
                summary: String::new(),
            }),
            Vec::new(),
        )
    }

    #[test]
    fn test_sell_65_pips_without_take_profit_is_approved() {
        let assessment = gate().evaluate(&proposal(Direction::Sell, 1.0845, 1.0910, None));

        assert!(assessment.approved);
        assert!(assessment.rejection_reason.is_none());
        assert!((assessment.risk_pips - 65.0).abs() < 1e-9);
        assert!((assessment.position_size - 0.308).abs() < 1e-3);
        assert!((assessment.dollar_risk - 200.0).abs() < 1e-9);
        assert!(assessment.risk_reward_ratio.is_none());
        assert!(assessment.reward_pips.is_none());
    }

    #[test]
    fn test_five_pip_stop_rejected_below_minimum() {
        let assessment = gate().evaluate(&proposal(Direction::Buy, 1.0845, 1.0840, None));

        assert!(!assessment.approved);
        let reason = assessment.rejection_reason.unwrap();
        assert!(reason.contains("below minimum"), "{reason}");
        assert!((assessment.risk_pips - 5.0).abs() < 1e-9);
        assert_eq!(assessment.position_size, 0.0);
    }

    #[test]
    fn test_stop_on_wrong_side_rejected() {
        let assessment = gate().evaluate(&proposal(Direction::Buy, 1.0845, 1.0910, None));
        assert!(!assessment.approved);
        let reason = assessment.rejection_reason.unwrap();
        assert!(reason.starts_with("Invalid stop loss"), "{reason}");

        let assessment = gate().evaluate(&proposal(Direction::Sell, 1.0845, 1.0845, None));
        assert!(!assessment.approved);
    }

    #[test]
    fn test_wide_stop_rejected_above_maximum() {
        let assessment = gate().evaluate(&proposal(Direction::Buy, 1.0845, 1.0700, None));
        assert!(!assessment.approved);
        let reason = assessment.rejection_reason.unwrap();
        assert!(reason.contains("exceeds maximum"), "{reason}");
    }

    #[test]
    fn test_exact_boundaries_are_admissible() {
        let at_min = gate().evaluate(&proposal(Direction::Buy, 1.0855, 1.0845, None));
        assert!(at_min.approved, "{:?}", at_min.rejection_reason);

        let at_max = gate().evaluate(&proposal(Direction::Buy, 1.0945, 1.0845, None));
        assert!(at_max.approved, "{:?}", at_max.rejection_reason);
    }

    #[test]
    fn test_sub_pip_shortfall_is_not_rounded_away() {
        // 9.96 pips reports as 10.0 but is still below the minimum
        let short = gate().evaluate(&proposal(Direction::Buy, 1.08450, 1.083504, None));
        assert!(!short.approved);
        assert!((short.risk_pips - 10.0).abs() < 1e-9);
        let reason = short.rejection_reason.unwrap();
        assert!(reason.contains("9.96 pips is below minimum"), "{reason}");

        // 100.04 pips reports as 100.0 but exceeds the maximum
        let wide = gate().evaluate(&proposal(Direction::Buy, 1.0945, 1.08446, None));
        assert!(!wide.approved);
        assert!(wide.rejection_reason.unwrap().contains("exceeds maximum"));
    }

    #[test]
    fn test_reward_ratio_at_minimum_is_admissible() {
        // 20 pip risk, 30 pip reward
        let assessment = gate().evaluate(&proposal(Direction::Buy, 1.0845, 1.0825, Some(1.0875)));
        assert!(assessment.approved, "{:?}", assessment.rejection_reason);
        assert!((assessment.reward_pips.unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_reward_ratio_rules() {
        // 20 pip risk, 20 pip reward
        let poor = gate().evaluate(&proposal(Direction::Buy, 1.0845, 1.0825, Some(1.0865)));
        assert!(!poor.approved);
        let reason = poor.rejection_reason.unwrap();
        assert!(reason.contains("below minimum of 1.5"), "{reason}");
        assert!((poor.risk_reward_ratio.unwrap() - 1.0).abs() < 1e-9);
        assert!(poor.position_size > 0.0);

        // 20 pip risk, 40 pip reward
        let good = gate().evaluate(&proposal(Direction::Buy, 1.0845, 1.0825, Some(1.0885)));
        assert!(good.approved);
        assert!((good.risk_reward_ratio.unwrap() - 2.0).abs() < 1e-9);
        assert!((good.reward_pips.unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_take_profit_on_wrong_side_rejected() {
        let assessment =
            gate().evaluate(&proposal(Direction::Sell, 1.0845, 1.0910, Some(1.1000)));
        assert!(!assessment.approved);
        let reason = assessment.rejection_reason.unwrap();
        assert!(reason.starts_with("Invalid take profit"), "{reason}");
    }

    #[test]
    fn test_jpy_pairs_use_two_decimal_pips() {
        let proposal = TradeProposal {
            pair: CurrencyPair::new("USD", "JPY").unwrap(),
            direction: Direction::Buy,
            entry_price: 150.00,
            stop_loss: 149.50,
            take_profit: None,
        };
        let assessment = gate().evaluate(&proposal);
        assert!(assessment.approved);
        assert!((assessment.risk_pips - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let gate = gate();
        let proposal = proposal(Direction::Sell, 1.0845, 1.0910, Some(1.0700));
        let first = gate.evaluate(&proposal);
        for _ in 0..10 {
            assert_eq!(gate.evaluate(&proposal), first);
        }
        let fresh = RiskGate::new(RiskConfig::default()).unwrap();
        assert_eq!(fresh.evaluate(&proposal), first);
    }

    #[test]
    fn test_custom_account_sizing() {
        let config = RiskConfig::builder()
            .account_balance(50_000.0)
            .max_risk_fraction(0.01)
            .build()
            .unwrap();
        let assessment = RiskGate::new(config)
            .unwrap()
            .evaluate(&proposal(Direction::Buy, 1.1000, 1.0950, None));
        // 500 at risk over 50 pips at 10 per pip
        assert!((assessment.position_size - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_proposal_from_technical() {
        let result = technical(Signal::Sell, 1.0845, Some(1.0910), Some(1.07));
        let proposal = TradeProposal::from_technical(eurusd(), Some(&result)).unwrap();
        assert_eq!(proposal.direction, Direction::Sell);
        assert_eq!(proposal.entry_price, 1.0845);
        assert_eq!(proposal.take_profit, Some(1.07));
    }

    #[test]
    fn test_hold_signal_infers_direction_from_stop() {
        let below = technical(Signal::Hold, 1.0845, Some(1.0800), None);
        let above = technical(Signal::Hold, 1.0845, Some(1.0900), None);
        let long = TradeProposal::from_technical(eurusd(), Some(&below)).unwrap();
        assert_eq!(long.direction, Direction::Buy);
        let short = TradeProposal::from_technical(eurusd(), Some(&above)).unwrap();
        assert_eq!(short.direction, Direction::Sell);
    }

    #[test]
    fn test_proposal_requires_usable_technical_result() {
        assert!(matches!(
            TradeProposal::from_technical(eurusd(), None),
            Err(RiskError::TechnicalUnavailable(_))
        ));

        let failed = TaskResult::failure(TaskKind::Technical, "timed out");
        let err = TradeProposal::from_technical(eurusd(), Some(&failed)).unwrap_err();
        assert!(err.to_string().contains("timed out"));

        let no_stop = technical(Signal::Buy, 1.0845, None, None);
        assert!(matches!(
            TradeProposal::from_technical(eurusd(), Some(&no_stop)),
            Err(RiskError::MissingLevel("stop_loss"))
        ));
    }
}
