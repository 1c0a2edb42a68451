//! Deterministic offline analyst
//!
//! Produces judgements from the resolved price and a static policy-rate
//! table. Useful without model credentials and in tests.

use async_trait::async_trait;
use forex_core::{
    Action, AnalysisProvider, AnalysisRequest, CurrencyPair, DecisionSynthesizer, Direction,
    FundamentalJudgement, Judgement, MarketData, NewsJudgement, Reasoning, Result, Sentiment,
    Signal, SynthesisDraft, SynthesisInput, TaskKind, TaskPayload, TechnicalJudgement,
};
use tracing::debug;

use crate::tasks::placeholder_price;

/// Central bank policy rates in percent
const POLICY_RATES: &[(&str, f64)] = &[
    ("USD", 5.0),
    ("EUR", 4.0),
    ("GBP", 5.0),
    ("JPY", 0.25),
    ("CHF", 1.5),
    ("AUD", 4.35),
    ("NZD", 5.5),
    ("CAD", 4.5),
];

/// Differential beyond which the rate gap is treated as directional
const DIFFERENTIAL_THRESHOLD: f64 = 0.5;

/// Daily move below which the trend reads sideways
const TREND_THRESHOLD: f64 = 0.001;

fn policy_rate(currency: &str) -> Option<f64> {
    POLICY_RATES
        .iter()
        .find(|(code, _)| *code == currency)
        .map(|(_, rate)| *rate)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Rule-based stand-in for a reasoning provider
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedAnalyst;

impl RuleBasedAnalyst {
    pub fn new() -> Self {
        Self
    }

    fn news(pair: &CurrencyPair) -> NewsJudgement {
        NewsJudgement {
            overall_sentiment: Sentiment::Neutral,
            sentiment_score: 0.0,
            key_events: Vec::new(),
            summary: format!("No news source configured; sentiment for {pair} treated as neutral"),
        }
    }

    fn technical(pair: &CurrencyPair, market: Option<&MarketData>) -> TechnicalJudgement {
        let price = market.map_or_else(|| placeholder_price(pair), |m| m.price);
        let fraction = market
            .and_then(|m| m.change)
            .map_or(0.0, |c| c.change_fraction);

        let (trend, signal) = if fraction > TREND_THRESHOLD {
            ("uptrend", Signal::Buy)
        } else if fraction < -TREND_THRESHOLD {
            ("downtrend", Signal::Sell)
        } else {
            ("sideways", Signal::Hold)
        };

        let support = price * 0.98;
        let resistance = price * 1.02;
        let (stop_loss, take_profit) = match signal {
            Signal::Sell => (resistance * 1.005, support * 0.995),
            Signal::Buy | Signal::Hold => (support * 0.995, resistance * 1.005),
        };

        TechnicalJudgement {
            current_price: price,
            price_provenance: market.map_or(forex_core::Provenance::Mock, |m| m.provenance),
            trend: trend.to_string(),
            signal,
            support: round_to(support, 5),
            resistance: round_to(resistance, 5),
            stop_loss: Some(round_to(stop_loss, 5)),
            take_profit: Some(round_to(take_profit, 5)),
            rsi: None,
            key_levels: vec![round_to(support, 5), round_to(resistance, 5)],
            summary: format!(
                "{pair} {trend} at {price}, {:+.2}% on the previous close",
                fraction * 100.0
            ),
        }
    }

    fn fundamental(pair: &CurrencyPair) -> FundamentalJudgement {
        let (Some(base), Some(quote)) = (policy_rate(pair.base()), policy_rate(pair.quote()))
        else {
            return FundamentalJudgement {
                outlook: Sentiment::Neutral,
                rate_differential: None,
                key_drivers: Vec::new(),
                summary: format!("No policy rate data for {pair}"),
            };
        };

        let differential = round_to(base - quote, 2);
        let outlook = if differential > DIFFERENTIAL_THRESHOLD {
            Sentiment::Bullish
        } else if differential < -DIFFERENTIAL_THRESHOLD {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        };

        FundamentalJudgement {
            outlook,
            rate_differential: Some(differential),
            key_drivers: vec![format!(
                "{} policy rate {base:.2}% vs {} {quote:.2}%",
                pair.base(),
                pair.quote()
            )],
            summary: format!("Rate differential of {differential:+.2} points for {pair}"),
        }
    }
}

#[async_trait]
impl AnalysisProvider for RuleBasedAnalyst {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Judgement> {
        let pair = &request.context.pair;
        let payload = match request.task {
            TaskKind::News => TaskPayload::News(Self::news(pair)),
            TaskKind::Technical => {
                TaskPayload::Technical(Self::technical(pair, request.market.as_ref()))
            }
            TaskKind::Fundamental => TaskPayload::Fundamental(Self::fundamental(pair)),
        };
        debug!(task = %request.task, %pair, "Rule-based judgement");
        Ok(Judgement::new(payload))
    }

    fn name(&self) -> &str {
        "rules"
    }
}

#[async_trait]
impl DecisionSynthesizer for RuleBasedAnalyst {
    async fn synthesize(&self, input: &SynthesisInput) -> Result<SynthesisDraft> {
        let direction = input.risk.direction;
        let views: Vec<(&str, Option<Direction>)> = vec![
            (
                "news",
                input
                    .task_results
                    .news
                    .as_ref()
                    .and_then(|r| r.news())
                    .and_then(|n| n.overall_sentiment.bias()),
            ),
            (
                "fundamental",
                input
                    .task_results
                    .fundamental
                    .as_ref()
                    .and_then(|r| r.fundamental())
                    .and_then(|f| f.outlook.bias()),
            ),
        ];

        let supporting: Vec<&str> = views
            .iter()
            .filter(|(_, view)| *view == Some(direction))
            .map(|(name, _)| *name)
            .collect();
        let opposing: Vec<&str> = views
            .iter()
            .filter(|(_, view)| *view == Some(direction.opposite()))
            .map(|(name, _)| *name)
            .collect();

        let mut reasoning = Reasoning::new(format!(
            "{direction} setup on {}: {} supporting, {} opposing",
            input.context.pair,
            supporting.len(),
            opposing.len()
        ));
        reasoning.key_factors = supporting
            .iter()
            .map(|name| format!("{name} view supports {direction}"))
            .collect();
        reasoning.risks = opposing
            .iter()
            .map(|name| format!("{name} view opposes {direction}"))
            .collect();
        reasoning.risks.extend(input.risk.warnings.iter().cloned());

        let draft = if !supporting.is_empty() && opposing.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let confidence = 0.6 + 0.1 * supporting.len() as f64;
            SynthesisDraft {
                action: Action::from(direction),
                confidence,
                reasoning,
            }
        } else {
            SynthesisDraft {
                action: Action::Wait,
                confidence: 0.4,
                reasoning,
            }
        };
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forex_core::{
        HistoricalChange, Provenance, QueryContext, RiskAssessment, TaskResult, TaskResults,
    };

    fn pair(s: &str) -> CurrencyPair {
        s.parse().unwrap()
    }

    fn live(price: f64, previous: f64) -> MarketData {
        MarketData {
            price,
            provenance: Provenance::Real,
            source: "test".to_string(),
            change: HistoricalChange::between(price, previous),
            ohlc: None,
        }
    }

    #[test]
    fn test_technical_levels_bracket_price() {
        let t = RuleBasedAnalyst::technical(&pair("EUR/USD"), Some(&live(1.1, 1.1)));
        assert_eq!(t.signal, Signal::Hold);
        assert_eq!(t.trend, "sideways");
        assert_eq!(t.price_provenance, Provenance::Real);
        assert_eq!(t.support, 1.078);
        assert_eq!(t.resistance, 1.122);
        assert!(t.stop_loss.unwrap() < t.support);
        assert!(t.take_profit.unwrap() > t.resistance);
    }

    #[test]
    fn test_falling_market_is_sell() {
        let t = RuleBasedAnalyst::technical(&pair("EUR/USD"), Some(&live(1.08, 1.09)));
        assert_eq!(t.signal, Signal::Sell);
        assert!(t.stop_loss.unwrap() > t.current_price);
        assert!(t.take_profit.unwrap() < t.current_price);
    }

    #[test]
    fn test_missing_market_uses_placeholder() {
        let t = RuleBasedAnalyst::technical(&pair("XAU/USD"), None);
        assert_eq!(t.current_price, 2650.0);
        assert_eq!(t.price_provenance, Provenance::Mock);
    }

    #[test]
    fn test_fundamental_differential() {
        let f = RuleBasedAnalyst::fundamental(&pair("USD/JPY"));
        assert_eq!(f.outlook, Sentiment::Bullish);
        assert_eq!(f.rate_differential, Some(4.75));

        let f = RuleBasedAnalyst::fundamental(&pair("EUR/USD"));
        assert_eq!(f.outlook, Sentiment::Bearish);

        let f = RuleBasedAnalyst::fundamental(&pair("XAU/USD"));
        assert_eq!(f.outlook, Sentiment::Neutral);
        assert!(f.rate_differential.is_none());
    }

    #[tokio::test]
    async fn test_analyze_matches_requested_kind() {
        let analyst = RuleBasedAnalyst::new();
        for kind in TaskKind::ALL {
            let request = AnalysisRequest::new(kind, QueryContext::new(pair("GBP/USD")));
            let judgement = analyst.analyze(&request).await.unwrap();
            assert_eq!(judgement.payload.kind(), kind);
        }
    }

    fn input(fundamental: &FundamentalJudgement, direction: Direction) -> SynthesisInput {
        let mut task_results = TaskResults::default();
        task_results.fundamental = Some(TaskResult::success(
            TaskPayload::Fundamental(fundamental.clone()),
            Vec::new(),
        ));
        task_results.news = Some(TaskResult::success(
            TaskPayload::News(RuleBasedAnalyst::news(&pair("EUR/USD"))),
            Vec::new(),
        ));
        SynthesisInput {
            query: "euro".to_string(),
            context: QueryContext::new(pair("EUR/USD")),
            task_results,
            risk: RiskAssessment {
                approved: true,
                direction,
                entry_price: 1.0845,
                stop_loss: 1.091,
                take_profit: None,
                position_size: 0.31,
                risk_pips: 65.0,
                reward_pips: None,
                risk_reward_ratio: None,
                dollar_risk: 200.0,
                risk_fraction: 0.02,
                rejection_reason: None,
                warnings: Vec::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_synthesis_follows_agreeing_views() {
        let bearish = RuleBasedAnalyst::fundamental(&pair("EUR/USD"));
        let draft = RuleBasedAnalyst::new()
            .synthesize(&input(&bearish, Direction::Sell))
            .await
            .unwrap();
        assert_eq!(draft.action, Action::Sell);
        assert!(draft.confidence > 0.6);
        assert_eq!(draft.reasoning.key_factors.len(), 1);
    }

    #[tokio::test]
    async fn test_synthesis_waits_on_opposition() {
        let bearish = RuleBasedAnalyst::fundamental(&pair("EUR/USD"));
        let draft = RuleBasedAnalyst::new()
            .synthesize(&input(&bearish, Direction::Buy))
            .await
            .unwrap();
        assert_eq!(draft.action, Action::Wait);
        assert!(draft.reasoning.risks[0].contains("opposes BUY"));
    }
}
