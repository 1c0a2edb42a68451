//! Plain-text rendering of pipeline results

use std::fmt::Write;

use forex_core::{AnalysisState, PriceQuote, Provenance, RiskAssessment};
use forex_prices::EnrichedQuote;
use forex_workflow::PipelineEvent;

pub fn print_state(state: &AnalysisState) {
    print!("{}", format_state(state));
}

pub fn print_event(event: &PipelineEvent) {
    println!("{}", format_event(event));
}

pub fn print_quote(quote: &PriceQuote) {
    println!(
        "{} {} (bid {} / ask {}) from {} at {}",
        quote.pair,
        quote.price,
        quote.bid,
        quote.ask,
        quote.source,
        quote.timestamp.to_rfc3339()
    );
}

pub fn print_enriched(quote: &EnrichedQuote) {
    match quote.quote.value() {
        Some(current) => print_quote(current),
        None => println!(
            "{}: unavailable ({})",
            quote.pair,
            quote.quote.reason().unwrap_or("unknown")
        ),
    }
    match quote.previous_close.value() {
        Some(close) => println!("  previous close ({}): {close}", quote.reference_date),
        None => println!("  previous close: unavailable"),
    }
    if let Some(ohlc) = quote.ohlc.value() {
        println!(
            "  range: O {} H {} L {} C {}",
            ohlc.open, ohlc.high, ohlc.low, ohlc.close
        );
    }
    if let Some(change) = quote.change {
        println!("  change: {:+.5} ({:+.2}%)", change.change, change.change_pct());
    }
}

pub fn print_assessment(assessment: &RiskAssessment) {
    print!("{}", format_assessment(assessment));
}

fn format_assessment(assessment: &RiskAssessment) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", assessment.summary());
    let _ = writeln!(
        out,
        "  {} entry {} stop {} ({:.1} pips)",
        assessment.direction, assessment.entry_price, assessment.stop_loss, assessment.risk_pips
    );
    if let (Some(tp), Some(ratio)) = (assessment.take_profit, assessment.risk_reward_ratio) {
        let _ = writeln!(out, "  take profit {tp} (R:R 1:{ratio:.2})");
    }
    for warning in &assessment.warnings {
        let _ = writeln!(out, "  warning: {warning}");
    }
    out
}

fn format_state(state: &AnalysisState) -> String {
    let mut out = String::new();
    if let Some(context) = state.context() {
        let _ = writeln!(
            out,
            "{} ({:?}, {:?}), parse confidence {:.2}",
            context.pair, context.asset_type, context.timeframe, context.confidence
        );
    }

    for result in state.task_results().iter() {
        match (&result.data, &result.error) {
            (Some(payload), _) => {
                let _ = writeln!(out, "  [{}] {}", result.task, payload.summary());
            }
            (None, error) => {
                let _ = writeln!(
                    out,
                    "  [{}] failed: {}",
                    result.task,
                    error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    if let Some(risk) = state.risk() {
        out.push_str(&format_assessment(risk));
    }

    let confidence = state.decision().map_or(0.0, |d| d.confidence);
    let _ = writeln!(
        out,
        "\nDecision: {} (confidence {:.0}%)",
        state.final_action(),
        confidence * 100.0
    );
    let _ = writeln!(out, "{}", state.explanation());

    if let Some(decision) = state.decision() {
        for factor in &decision.reasoning.key_factors {
            let _ = writeln!(out, "  + {factor}");
        }
        for risk in &decision.reasoning.risks {
            let _ = writeln!(out, "  - {risk}");
        }
        if let Some(params) = &decision.trade_parameters {
            let _ = write!(
                out,
                "Order: entry {} stop {} size {:.2} lots",
                params.entry_price, params.stop_loss, params.position_size
            );
            if let Some(tp) = params.take_profit {
                let _ = write!(out, " target {tp}");
            }
            if params.price_provenance == Provenance::Mock {
                out.push_str(" [placeholder price]");
            }
            out.push('\n');
        }
    }

    for (key, error) in state.errors() {
        let _ = writeln!(out, "  ! {key}: {error}");
    }
    out
}

fn format_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::Started { run_id, query } => format!("[started] {run_id}: {query}"),
        PipelineEvent::StageEntered { stage, .. } => format!("[stage] {stage}"),
        PipelineEvent::ContextParsed { context, .. } => {
            format!("[parsed] {} {:?}", context.pair, context.intent)
        }
        PipelineEvent::TaskCompleted { result, .. } => match &result.error {
            None => format!("[task] {} done in {}ms", result.task, result.elapsed_ms),
            Some(error) => format!("[task] {} failed: {error}", result.task),
        },
        PipelineEvent::RiskEvaluated {
            approved, reason, ..
        } => match reason {
            Some(reason) if !approved => format!("[risk] rejected: {reason}"),
            _ => "[risk] approved".to_string(),
        },
        PipelineEvent::DecisionMade { decision, .. } => format!(
            "[decision] {} ({:.0}%)",
            decision.action,
            decision.confidence * 100.0
        ),
        PipelineEvent::Finished {
            action,
            step_count,
            explanation,
            ..
        } => format!("[finished] {action} after {step_count} steps: {explanation}"),
        PipelineEvent::Failed { error, .. } => format!("[failed] {error}"),
    }
}
