//! Final decision synthesis
//!
//! The synthesizer only proposes an action, a confidence and its reasoning.
//! Order parameters always come from the approved risk assessment, so a
//! decision can never trade a size or stop the gate did not vet.

use std::time::Duration;

use forex_core::{
    Decision, DecisionSynthesizer, Provenance, Reasoning, RiskAssessment, SynthesisDraft,
    SynthesisInput, TradeParameters,
};
use tracing::{info, instrument, warn};

/// Decision plus the failure that forced a fallback, if any
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutcome {
    pub decision: Decision,
    pub error: Option<String>,
}

/// Ask `synthesizer` for a decision on an approved trade.
///
/// A synthesizer error, or no answer within `limit`, yields WAIT with zero
/// confidence and the failure reported alongside.
#[instrument(skip_all, fields(pair = %input.context.pair))]
pub async fn synthesize(
    synthesizer: &dyn DecisionSynthesizer,
    input: &SynthesisInput,
    provenance: Provenance,
    limit: Duration,
) -> SynthesisOutcome {
    let answer = tokio::time::timeout(limit, synthesizer.synthesize(input))
        .await
        .unwrap_or_else(|_| {
            Err(forex_core::Error::ProviderFailed(format!(
                "synthesis timed out after {}s",
                limit.as_secs_f64()
            )))
        });

    match answer {
        Ok(draft) => SynthesisOutcome {
            decision: finalize(draft, &input.risk, provenance),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Synthesis failed, defaulting to WAIT");
            let mut reasoning = Reasoning::new(format!(
                "Synthesis failed ({e}); no trade is recommended without a final review"
            ));
            reasoning.risks.push(input.risk.summary());
            SynthesisOutcome {
                decision: Decision::wait(0.0, reasoning),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Attach gate-vetted order parameters to `draft`
pub fn finalize(draft: SynthesisDraft, risk: &RiskAssessment, provenance: Provenance) -> Decision {
    let SynthesisDraft {
        action,
        confidence,
        mut reasoning,
    } = draft;

    let Some(direction) = action.direction() else {
        info!(confidence, "Synthesis recommends WAIT");
        return Decision::wait(confidence, reasoning);
    };

    if direction != risk.direction {
        warn!(
            proposed = %direction,
            validated = %risk.direction,
            "Synthesis contradicts the validated direction, downgrading to WAIT"
        );
        reasoning.risks.push(format!(
            "Proposed {direction} conflicts with the risk-validated {} setup",
            risk.direction
        ));
        return Decision::wait(confidence, reasoning);
    }

    if provenance == Provenance::Mock {
        reasoning
            .risks
            .push("Entry price is a placeholder, not a live quote".to_string());
    }

    info!(%direction, confidence, size = risk.position_size, "Synthesis recommends a trade");
    Decision::trade(
        direction,
        confidence,
        reasoning,
        TradeParameters {
            entry_price: risk.entry_price,
            stop_loss: risk.stop_loss,
            take_profit: risk.take_profit,
            position_size: risk.position_size,
            price_provenance: provenance,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forex_core::{Action, Direction, QueryContext, TaskResults};

    fn risk() -> RiskAssessment {
        RiskAssessment {
            approved: true,
            direction: Direction::Sell,
            entry_price: 1.0845,
            stop_loss: 1.0910,
            take_profit: Some(1.0720),
            position_size: 0.31,
            risk_pips: 65.0,
            reward_pips: Some(125.0),
            risk_reward_ratio: Some(1.92),
            dollar_risk: 200.0,
            risk_fraction: 0.02,
            rejection_reason: None,
            warnings: Vec::new(),
        }
    }

    fn draft(action: Action) -> SynthesisDraft {
        SynthesisDraft {
            action,
            confidence: 0.7,
            reasoning: Reasoning::new("Downtrend intact"),
        }
    }

    #[test]
    fn test_trade_takes_parameters_from_risk() {
        let decision = finalize(draft(Action::Sell), &risk(), Provenance::Real);
        assert_eq!(decision.action, Action::Sell);
        let params = decision.trade_parameters.unwrap();
        assert_eq!(params.entry_price, 1.0845);
        assert_eq!(params.stop_loss, 1.0910);
        assert_eq!(params.take_profit, Some(1.0720));
        assert_eq!(params.position_size, 0.31);
        assert_eq!(params.price_provenance, Provenance::Real);
    }

    #[test]
    fn test_mock_provenance_is_carried() {
        let decision = finalize(draft(Action::Sell), &risk(), Provenance::Mock);
        assert_eq!(
            decision.trade_parameters.unwrap().price_provenance,
            Provenance::Mock
        );
        let risks = &decision.reasoning.risks;
        assert!(risks.iter().any(|r| r.contains("placeholder")));
    }

    #[test]
    fn test_conflicting_direction_becomes_wait() {
        let decision = finalize(draft(Action::Buy), &risk(), Provenance::Real);
        assert_eq!(decision.action, Action::Wait);
        assert!(decision.trade_parameters.is_none());
        assert!(decision.reasoning.risks[0].contains("conflicts"));
        assert!(decision.is_consistent());
    }

    #[test]
    fn test_wait_draft() {
        let decision = finalize(draft(Action::Wait), &risk(), Provenance::Real);
        assert_eq!(decision.action, Action::Wait);
        assert_eq!(decision.confidence, 0.7);
    }

    struct Broken;

    #[async_trait]
    impl DecisionSynthesizer for Broken {
        async fn synthesize(&self, _input: &SynthesisInput) -> forex_core::Result<SynthesisDraft> {
            Err(forex_core::Error::ProviderFailed("timeout".to_string()))
        }
    }

    const LIMIT: Duration = Duration::from_secs(30);

    fn input() -> SynthesisInput {
        SynthesisInput {
            query: "sell euro".to_string(),
            context: QueryContext::new("EUR/USD".parse().unwrap()),
            task_results: TaskResults::default(),
            risk: risk(),
        }
    }

    #[tokio::test]
    async fn test_failure_yields_zero_confidence_wait() {
        let outcome = synthesize(&Broken, &input(), Provenance::Real, LIMIT).await;
        assert_eq!(outcome.decision.action, Action::Wait);
        assert_eq!(outcome.decision.confidence, 0.0);
        assert!(outcome.error.unwrap().contains("timeout"));
    }

    struct Silent;

    #[async_trait]
    impl DecisionSynthesizer for Silent {
        async fn synthesize(&self, _input: &SynthesisInput) -> forex_core::Result<SynthesisDraft> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_synthesis_waits_after_limit() {
        let started = tokio::time::Instant::now();
        let outcome = synthesize(&Silent, &input(), Provenance::Real, LIMIT).await;

        assert_eq!(started.elapsed(), LIMIT);
        assert_eq!(outcome.decision.action, Action::Wait);
        assert_eq!(outcome.decision.confidence, 0.0);
        assert!(outcome.decision.trade_parameters.is_none());
        assert_eq!(
            outcome.error.as_deref(),
            Some("Provider failed: synthesis timed out after 30s")
        );
    }
}
