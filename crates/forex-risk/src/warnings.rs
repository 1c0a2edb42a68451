//! Contextual warnings layered onto a risk assessment
//!
//! Enrichment reads the other tasks' results and adds human readable
//! warnings. It never touches `approved` or the sizing fields.

use forex_core::{Direction, Provenance, RiskAssessment, Sentiment, TaskResults};

use crate::config::RiskConfig;

/// Ratios within this fraction above the minimum count as marginal
const MARGINAL_RATIO_BAND: f64 = 0.1;
/// Stops using more than this fraction of the allowed maximum count as wide
const WIDE_STOP_BAND: f64 = 0.8;

fn sentiment_label(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Bullish => "bullish",
        Sentiment::Bearish => "bearish",
        Sentiment::Neutral => "neutral",
    }
}

fn opposes(sentiment: Sentiment, direction: Direction) -> bool {
    sentiment.bias() == Some(direction.opposite())
}

/// Return `assessment` with warnings derived from `results` appended
pub fn enrich(
    mut assessment: RiskAssessment,
    results: &TaskResults,
    config: &RiskConfig,
) -> RiskAssessment {
    let direction = assessment.direction;
    let mut warnings = Vec::new();

    for failed in results.failed() {
        warnings.push(format!(
            "{} analysis unavailable ({}); decision relies on partial information",
            failed.task,
            failed.error.as_deref().unwrap_or("unknown error")
        ));
    }

    if let Some(technical) = results.technical.as_ref().and_then(|r| r.technical()) {
        if technical.price_provenance == Provenance::Mock {
            warnings.push(
                "Entry price is a locally generated placeholder (mock), not a live quote"
                    .to_string(),
            );
        }
    }

    if let Some(news) = results.news.as_ref().and_then(|r| r.news()) {
        if opposes(news.overall_sentiment, direction) {
            warnings.push(format!(
                "News sentiment is {} which conflicts with a {direction} trade",
                sentiment_label(news.overall_sentiment)
            ));
        }
    }

    if let Some(fundamental) = results.fundamental.as_ref().and_then(|r| r.fundamental()) {
        if opposes(fundamental.outlook, direction) {
            warnings.push(format!(
                "Fundamental outlook is {} which conflicts with a {direction} trade",
                sentiment_label(fundamental.outlook)
            ));
        }
    }

    match assessment.risk_reward_ratio {
        Some(ratio)
            if assessment.approved
                && ratio < config.min_risk_reward_ratio * (1.0 + MARGINAL_RATIO_BAND) =>
        {
            warnings.push(format!(
                "Risk/reward ratio {ratio:.2} is only marginally above the minimum of {}",
                config.min_risk_reward_ratio
            ));
        }
        None if assessment.approved => {
            warnings.push("No take-profit level set; reward cannot be assessed".to_string());
        }
        _ => {}
    }

    if assessment.approved && assessment.risk_pips > config.max_risk_pips * WIDE_STOP_BAND {
        warnings.push(format!(
            "Stop distance of {:.1} pips is close to the maximum of {} pips",
            assessment.risk_pips, config.max_risk_pips
        ));
    }

    assessment.warnings.extend(warnings);
    assessment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RiskGate, TradeProposal};
    use forex_core::{
        CurrencyPair, FundamentalJudgement, NewsJudgement, Signal, TaskKind, TaskPayload,
        TaskResult, TechnicalJudgement,
    };

    fn results(provenance: Provenance, news: Sentiment) -> TaskResults {
        TaskResults {
            news: Some(TaskResult::success(
                TaskPayload::News(NewsJudgement {
                    overall_sentiment: news,
                    sentiment_score: 0.6,
                    key_events: Vec::new(),
                    summary: String::new(),
                }),
                Vec::new(),
            )),
            technical: Some(TaskResult::success(
                TaskPayload::Technical(TechnicalJudgement {
                    current_price: 1.0845,
                    price_provenance: provenance,
                    trend: "down".to_string(),
                    signal: Signal::Sell,
                    support: 1.08,
                    resistance: 1.09,
                    stop_loss: Some(1.0910),
                    take_profit: None,
                    rsi: None,
                    key_levels: Vec::new(),
                    summary: String::new(),
                }),
                Vec::new(),
            )),
            fundamental: Some(TaskResult::failure(
                TaskKind::Fundamental,
                "provider timed out",
            )),
        }
    }

    fn sell_assessment(take_profit: Option<f64>) -> RiskAssessment {
        let gate = RiskGate::new(RiskConfig::default()).unwrap();
        gate.evaluate(&TradeProposal {
            pair: CurrencyPair::new("EUR", "USD").unwrap(),
            direction: Direction::Sell,
            entry_price: 1.0845,
            stop_loss: 1.0910,
            take_profit,
        })
    }

    #[test]
    fn test_enrich_adds_contextual_warnings() {
        let base = sell_assessment(None);
        let enriched = enrich(
            base.clone(),
            &results(Provenance::Mock, Sentiment::Bullish),
            &RiskConfig::default(),
        );

        assert_eq!(enriched.approved, base.approved);
        assert_eq!(enriched.position_size, base.position_size);
        let all = enriched.warnings.join("\n");
        assert!(all.contains("fundamental analysis unavailable (provider timed out)"));
        assert!(all.contains("placeholder (mock)"));
        assert!(all.contains("News sentiment is bullish"));
        assert!(all.contains("No take-profit"));
    }

    #[test]
    fn test_enrich_never_changes_verdict() {
        let mut rejected = sell_assessment(None);
        rejected.approved = false;
        rejected.rejection_reason = Some("nope".to_string());
        let enriched = enrich(
            rejected.clone(),
            &results(Provenance::Real, Sentiment::Bearish),
            &RiskConfig::default(),
        );
        assert!(!enriched.approved);
        assert_eq!(enriched.rejection_reason, rejected.rejection_reason);
    }

    #[test]
    fn test_aligned_context_adds_no_conflict_warnings() {
        // 65 pip risk, 100 pip reward: ratio 1.54 is marginal
        let enriched = enrich(
            sell_assessment(Some(1.0745)),
            &results(Provenance::Real, Sentiment::Bearish),
            &RiskConfig::default(),
        );
        let all = enriched.warnings.join("\n");
        assert!(!all.contains("conflicts"));
        assert!(!all.contains("mock"));
        assert!(all.contains("marginally above the minimum"));
    }

    #[test]
    fn test_fundamental_conflict_detected() {
        let mut results = results(Provenance::Real, Sentiment::Neutral);
        results.fundamental = Some(TaskResult::success(
            TaskPayload::Fundamental(FundamentalJudgement {
                outlook: Sentiment::Bullish,
                rate_differential: Some(0.5),
                key_drivers: Vec::new(),
                summary: String::new(),
            }),
            Vec::new(),
        ));
        let enriched = enrich(sell_assessment(None), &results, &RiskConfig::default());
        let bullish = |w: &String| w.starts_with("Fundamental outlook is bullish");
        assert!(enriched.warnings.iter().any(bullish));
    }
}
