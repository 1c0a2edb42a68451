//! Command-line interface for forex-agent-rs
//!
//! # Usage
//!
//! ```bash
//! # Full analysis; uses the language model analyst when ANTHROPIC_API_KEY is set
//! forex-cli analyze "Should I sell EUR/USD today?" --balance 25000 --max-risk 0.01
//!
//! # Follow a run as it progresses
//! forex-cli analyze "gold outlook" --stream
//!
//! # Price lookups and standalone risk checks
//! forex-cli price XAU/USD --enriched
//! forex-cli risk --pair EUR/USD --direction sell --entry 1.0845 --stop 1.0910
//! ```

mod output;

use std::pin::pin;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use forex_core::{CurrencyPair, Direction};
use forex_prices::{PriceConfig, PriceService};
use forex_risk::{AccountConfig, RiskConfig, RiskGate, TradeProposal};
use forex_utils::{AppConfig, LogFormat, env_var, env_var_or};
use forex_workflow::{LlmAnalyst, Pipeline, PipelineConfig, PipelineEvent, RuleBasedAnalyst};
use futures::StreamExt;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "forex-cli")]
#[command(about = "Forex trading analysis with a risk-gated decision pipeline", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the analysis pipeline on a natural language query
    Analyze {
        /// The question, e.g. "Should I buy gold?"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        #[command(flatten)]
        account: AccountArgs,

        /// Print progress events as they happen
        #[arg(long)]
        stream: bool,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Look up the current price of a pair
    Price {
        /// Pair such as EUR/USD, EURUSD or XAU/USD
        pair: CurrencyPair,

        /// Include the previous close, daily range and change
        #[arg(long)]
        enriched: bool,

        #[arg(long)]
        json: bool,
    },

    /// Check a trade against the risk rules without running any analysis
    Risk {
        #[arg(long)]
        pair: CurrencyPair,

        /// buy or sell
        #[arg(long)]
        direction: Direction,

        #[arg(long)]
        entry: f64,

        #[arg(long)]
        stop: f64,

        #[arg(long)]
        take_profit: Option<f64>,

        #[command(flatten)]
        account: AccountArgs,

        #[arg(long)]
        json: bool,
    },
}

/// Per-run account overrides
#[derive(clap::Args, Debug, Clone, Copy)]
struct AccountArgs {
    /// Account balance, overriding ACCOUNT_BALANCE
    #[arg(long)]
    balance: Option<f64>,

    /// Fraction of the balance to risk, overriding MAX_RISK_PER_TRADE
    #[arg(long)]
    max_risk: Option<f64>,
}

impl AccountArgs {
    fn to_account(self) -> Option<AccountConfig> {
        (self.balance.is_some() || self.max_risk.is_some()).then_some(AccountConfig {
            balance: self.balance,
            max_risk_fraction: self.max_risk,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let format = env_var_or("LOG_FORMAT", LogFormat::Text)?;
    forex_utils::init_tracing_with(format);

    let args = Args::parse();
    let app = AppConfig::from_env();
    info!(app = %app.app_name, environment = %app.environment, "Starting forex-cli");

    match args.command {
        Command::Analyze {
            query,
            account,
            stream,
            json,
        } => analyze(query.join(" "), account.to_account(), stream, json).await,
        Command::Price {
            pair,
            enriched,
            json,
        } => price(pair, enriched, json).await,
        Command::Risk {
            pair,
            direction,
            entry,
            stop,
            take_profit,
            account,
            json,
        } => {
            let proposal = TradeProposal {
                pair,
                direction,
                entry_price: entry,
                stop_loss: stop,
                take_profit,
            };
            risk(&proposal, account.to_account(), json)
        }
    }
}

fn build_pipeline() -> anyhow::Result<Arc<Pipeline>> {
    let config = PipelineConfig::from_env()?;
    let prices = Arc::new(PriceService::new(&PriceConfig::from_env()?)?);
    let builder = Pipeline::builder().config(config).price_service(prices);

    let builder = if env_var::<String>("ANTHROPIC_API_KEY")?.is_some() {
        let analyst =
            Arc::new(LlmAnalyst::from_env().context("failed to set up the model analyst")?);
        info!(model = %analyst.config().model, "Using language model analyst");
        builder
            .interpreter(analyst.clone())
            .provider(analyst.clone())
            .synthesizer(analyst)
    } else {
        warn!("ANTHROPIC_API_KEY not set, using the rule-based analyst");
        let analyst = Arc::new(RuleBasedAnalyst::new());
        builder.provider(analyst.clone()).synthesizer(analyst)
    };

    Ok(Arc::new(builder.build()?))
}

async fn analyze(
    query: String,
    account: Option<AccountConfig>,
    stream: bool,
    json: bool,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline()?;

    if !stream {
        let state = pipeline.run(query, account).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&state)?);
        } else {
            output::print_state(&state);
        }
        return Ok(());
    }

    let mut events = pin!(pipeline.run_stream(query, account));
    while let Some(event) = events.next().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            output::print_event(&event);
        }
        if let PipelineEvent::Failed { error, .. } = event {
            bail!("analysis failed: {error}");
        }
    }
    Ok(())
}

async fn price(pair: CurrencyPair, enriched: bool, json: bool) -> anyhow::Result<()> {
    let service = PriceService::new(&PriceConfig::from_env()?)?;

    if enriched {
        let quote = service.get_enriched(&pair).await;
        if json {
            println!("{}", serde_json::to_string_pretty(&quote)?);
        } else {
            output::print_enriched(&quote);
        }
        return Ok(());
    }

    let lookup = service.get(&pair).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&lookup)?);
    }
    match lookup.available() {
        Some(quote) => {
            if !json {
                output::print_quote(&quote);
            }
            Ok(())
        }
        None if json => Ok(()),
        None => bail!("no price available for {pair}"),
    }
}

fn risk(
    proposal: &TradeProposal,
    account: Option<AccountConfig>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = RiskConfig::from_env()?;
    if let Some(account) = account {
        config = config.with_account(&account)?;
    }
    let assessment = RiskGate::new(config)?.evaluate(proposal);

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        output::print_assessment(&assessment);
    }
    Ok(())
}
