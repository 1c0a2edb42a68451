//! Language-model backed analyst

use std::sync::Arc;

use async_trait::async_trait;
use forex_core::{
    AdditionalContext, AnalysisProvider, AnalysisRequest, AssetType, CurrencyPair,
    DecisionSynthesizer, Error, FundamentalJudgement, Judgement, NewsJudgement, QueryContext,
    QueryInterpreter, Result, RiskTolerance, SourceCitation, SynthesisDraft, SynthesisInput,
    TaskKind, TaskPayload, TechnicalJudgement, Timeframe, UserIntent,
};
use forex_llm::{CompletionRequest, LLMProvider, LlmConfig};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::json::decode;

const ANALYST_SYSTEM: &str = "You are a professional forex and commodities analyst. \
Answer with a single JSON object matching the requested schema and nothing else. \
Do not wrap it in markdown.";

const PARSER_SYSTEM: &str = "You are a trading query parser. Transform natural language \
queries into structured JSON context. Answer with a single JSON object and nothing else.";

/// Judgement fields plus optional citations, as returned by the model
#[derive(Deserialize)]
struct Sourced<T> {
    #[serde(flatten)]
    judgement: T,
    #[serde(default)]
    sources: Vec<SourceCitation>,
}

/// Interpreter answer before the pair is validated
#[derive(Deserialize)]
struct InterpretedQuery {
    pair: String,
    #[serde(default)]
    asset_type: AssetType,
    #[serde(default)]
    timeframe: Timeframe,
    #[serde(default, alias = "user_intent")]
    intent: UserIntent,
    #[serde(default)]
    risk_tolerance: RiskTolerance,
    #[serde(default, alias = "additional_context")]
    additional: AdditionalContext,
    #[serde(default)]
    confidence: Option<f64>,
}

impl InterpretedQuery {
    fn into_context(self) -> Result<QueryContext> {
        let pair: CurrencyPair = self.pair.parse()?;
        let mut context = QueryContext::new(pair)
            .with_asset_type(self.asset_type)
            .with_timeframe(self.timeframe)
            .with_intent(self.intent)
            .with_risk_tolerance(self.risk_tolerance)
            .with_additional(self.additional);
        if let Some(confidence) = self.confidence {
            context = context.with_confidence(confidence);
        }
        Ok(context)
    }
}

/// Analyst that delegates every judgement to an [`LLMProvider`]
pub struct LlmAnalyst {
    provider: Arc<dyn LLMProvider>,
    config: LlmConfig,
}

impl LlmAnalyst {
    pub fn new(provider: Arc<dyn LLMProvider>, config: LlmConfig) -> Self {
        Self { provider, config }
    }

    /// Analyst backed by Anthropic, configured from the environment
    #[cfg(feature = "anthropic")]
    pub fn from_env() -> forex_llm::Result<Self> {
        let provider = forex_llm::AnthropicProvider::from_env()?;
        Ok(Self::new(Arc::new(provider), LlmConfig::from_env()?))
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn ask(&self, system: &str, prompt: String) -> Result<String> {
        let request = CompletionRequest::ask(&self.config, system, prompt);

        let response = self.provider.complete(request).await.map_err(|e| {
            warn!(
                provider = self.provider.name(),
                retryable = e.is_retryable(),
                "Model call failed"
            );
            Error::ProviderFailed(format!("{}: {e}", self.provider.name()))
        })?;

        debug!(
            tokens = response.usage.total(),
            stop_reason = ?response.stop_reason,
            "Model answered"
        );
        if response.is_truncated() {
            warn!("Model output truncated at max_tokens; decoding may fail");
        }
        Ok(response.text())
    }

    async fn judge<T: DeserializeOwned>(&self, prompt: String) -> Result<(T, Vec<SourceCitation>)> {
        let text = self.ask(ANALYST_SYSTEM, prompt).await?;
        let sourced: Sourced<T> = decode(&text)?;
        Ok((sourced.judgement, sourced.sources))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn news_prompt(context: &QueryContext) -> String {
    format!(
        r#"Assess the current news sentiment for {pair}.

QUERY CONTEXT:
{context}

Consider central bank communication, economic releases and geopolitical events that
moved or may move {pair} in the {timeframe:?} horizon.

OUTPUT FORMAT (JSON):
{{
  "overall_sentiment": "bullish|bearish|neutral",
  "sentiment_score": -1.0 to 1.0,
  "key_events": ["event1", "event2"],
  "summary": "Two sentences on what drives sentiment",
  "sources": [{{"title": "headline", "url": "https://..."}}]
}}"#,
        pair = context.pair,
        timeframe = context.timeframe,
        context = to_json(context),
    )
}

fn technical_prompt(request: &AnalysisRequest) -> String {
    let context = &request.context;
    let market = request
        .market
        .as_ref()
        .map_or_else(|| "unavailable".to_string(), to_json);
    format!(
        r#"Perform a technical analysis of {pair}.

QUERY CONTEXT:
{context}

MARKET DATA:
{market}

Use the market data price as current_price. Price levels must be logical:
support < current_price < resistance, the stop loss on the protective side of
the entry and the take profit on the other.

OUTPUT FORMAT (JSON):
{{
  "current_price": 1.0850,
  "trend": "uptrend|downtrend|sideways",
  "signal": "BUY|SELL|HOLD",
  "support": 1.0800,
  "resistance": 1.0950,
  "stop_loss": 1.0780,
  "take_profit": 1.0980,
  "rsi": 55.0,
  "key_levels": [1.0800, 1.0900],
  "summary": "One paragraph technical summary"
}}"#,
        pair = context.pair,
        context = to_json(context),
    )
}

fn fundamental_prompt(context: &QueryContext) -> String {
    format!(
        r#"Assess the fundamental outlook for {pair} ({base} against {quote}).

QUERY CONTEXT:
{context}

Compare monetary policy, growth and inflation of both legs. For commodities and
crypto, weigh real yields, dollar strength and flows instead.

OUTPUT FORMAT (JSON):
{{
  "outlook": "bullish|bearish|neutral",
  "rate_differential": 0.75,
  "key_drivers": ["driver1", "driver2"],
  "summary": "One paragraph fundamental summary"
}}"#,
        pair = context.pair,
        base = context.pair.base(),
        quote = context.pair.quote(),
        context = to_json(context),
    )
}

fn parser_prompt(query: &str) -> String {
    format!(
        r#"USER QUERY: "{query}"

Extract:
1. pair: normalized as BASE/QUOTE ("gold" -> "XAU/USD", "bitcoin" -> "BTC/USD",
   "euro dollar" -> "EUR/USD", "EURUSD" -> "EUR/USD"); default "EUR/USD"
2. asset_type: forex | commodity | crypto | index
3. timeframe: short_term | medium_term | long_term (default short_term)
4. user_intent: trading_signal | buy_signal | sell_signal | market_overview | risk_assessment
5. risk_tolerance: conservative | moderate | aggressive (default moderate)
6. additional_context: keywords, mentioned_indicators, mentioned_events, price_levels
7. confidence: 0.0 to 1.0

OUTPUT FORMAT (JSON):
{{
  "pair": "XAU/USD",
  "asset_type": "commodity",
  "timeframe": "short_term",
  "user_intent": "trading_signal",
  "risk_tolerance": "moderate",
  "additional_context": {{"keywords": ["gold"], "mentioned_indicators": [], "mentioned_events": [], "price_levels": []}},
  "confidence": 0.95
}}"#
    )
}

fn synthesis_prompt(input: &SynthesisInput) -> String {
    format!(
        r#"Synthesize a final trading decision for {pair}.

USER QUERY: "{query}"

ANALYSIS RESULTS:
{results}

RISK ASSESSMENT (binding; the trade below has been sized and approved):
{risk}

RULES:
- The only tradeable direction is {direction}; otherwise answer WAIT
- Only recommend {direction} if confidence is above 0.7
- Explain how conflicting analyses were weighed

OUTPUT FORMAT (JSON):
{{
  "action": "BUY|SELL|WAIT",
  "confidence": 0.0 to 1.0,
  "reasoning": {{
    "summary": "One paragraph summary of the decision",
    "key_factors": ["factor1", "factor2"],
    "risks": ["risk1", "risk2"]
  }}
}}"#,
        pair = input.context.pair,
        query = input.query,
        results = to_json(&input.task_results),
        risk = to_json(&input.risk),
        direction = input.risk.direction,
    )
}

#[async_trait]
impl AnalysisProvider for LlmAnalyst {
    #[instrument(skip_all, fields(task = %request.task, pair = %request.context.pair))]
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Judgement> {
        let (payload, sources) = match request.task {
            TaskKind::News => {
                let (news, sources) = self
                    .judge::<NewsJudgement>(news_prompt(&request.context))
                    .await?;
                (TaskPayload::News(news), sources)
            }
            TaskKind::Technical => {
                let (technical, sources) = self
                    .judge::<TechnicalJudgement>(technical_prompt(request))
                    .await?;
                (TaskPayload::Technical(technical), sources)
            }
            TaskKind::Fundamental => {
                let (fundamental, sources) = self
                    .judge::<FundamentalJudgement>(fundamental_prompt(&request.context))
                    .await?;
                (TaskPayload::Fundamental(fundamental), sources)
            }
        };
        Ok(Judgement::new(payload).with_sources(sources))
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

#[async_trait]
impl QueryInterpreter for LlmAnalyst {
    #[instrument(skip_all)]
    async fn interpret(&self, query: &str) -> Result<QueryContext> {
        let text = self.ask(PARSER_SYSTEM, parser_prompt(query)).await?;
        decode::<InterpretedQuery>(&text)?.into_context()
    }
}

#[async_trait]
impl DecisionSynthesizer for LlmAnalyst {
    #[instrument(skip_all, fields(pair = %input.context.pair))]
    async fn synthesize(&self, input: &SynthesisInput) -> Result<SynthesisDraft> {
        let text = self.ask(ANALYST_SYSTEM, synthesis_prompt(input)).await?;
        decode(&text)
    }
}
