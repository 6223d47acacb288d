//! Classify messages for mental-health risk and print one JSON line each.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable unless
//! `--offline` is given.
//!
//! # Examples
//!
//! ```sh
//! # Single message
//! mia-risk --message "Eu me sinto muito sozinha"
//!
//! # Several messages, classified concurrently through one evaluator
//! mia-risk --message "oi" --message "quero me machucar" --room room-42
//!
//! # One message per line from stdin, keyword screen only
//! cat messages.txt | mia-risk --stdin --offline --min-spacing-ms 0
//! ```

use clap::Parser;
use futures::future::join_all;
use mia_risk::api::router::ModelRouting;
use mia_risk::prelude::*;
use serde::Serialize;
use std::io::{self, BufRead};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Classify messages for mental-health risk (low / medium / high).
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "mia-risk")]
struct Cli {
    // ── Input ──────────────────────────────────────────────────
    /// Message to classify (repeatable)
    #[arg(long = "message")]
    messages: Vec<String>,

    /// Read messages from stdin, one per line
    #[arg(long)]
    stdin: bool,

    /// Room the messages belong to
    #[arg(long)]
    room: Option<String>,

    // ── Model selection ────────────────────────────────────────
    /// Classify with the local keyword screen instead of OpenRouter
    #[arg(long)]
    offline: bool,

    /// Model for small (default) classification requests
    #[arg(long, default_value = mia_risk::DEFAULT_MODEL)]
    model: String,

    /// Model for large classification requests
    #[arg(long)]
    large_model: Option<String>,

    // ── Rate limiting ──────────────────────────────────────────
    /// Minimum spacing between upstream calls, in milliseconds
    #[arg(long, default_value_t = 2000)]
    min_spacing_ms: u64,

    /// Attempts per classification when rate limited
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    // ── Output ─────────────────────────────────────────────────
    /// Log evaluator activity at debug level to stderr
    #[arg(long)]
    verbose: bool,
}

/// One output line.
#[derive(Serialize)]
struct ClassifiedLine<'a> {
    message: &'a str,
    #[serde(flatten)]
    result: EvaluationResult,
    crisis: bool,
}

// ── Helpers ────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "mia_risk=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn collect_messages(cli: &Cli) -> Result<Vec<String>, String> {
    let mut messages = cli.messages.clone();
    if cli.stdin {
        for line in io::stdin().lock().lines() {
            let line = line.map_err(|e| format!("failed to read stdin: {e}"))?;
            if !line.trim().is_empty() {
                messages.push(line);
            }
        }
    }
    if messages.is_empty() {
        return Err("provide --message, --stdin, or both".to_string());
    }
    Ok(messages)
}

fn build_runtime(cli: &Cli) -> Result<AgentRuntime, String> {
    if cli.offline {
        return Ok(AgentRuntime::new(Arc::new(KeywordModel)));
    }
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable is not set".to_string())?;
    let client = OpenRouterClient::new(api_key)?.with_routing(ModelRouting::from_models(
        cli.model.clone(),
        cli.large_model.clone(),
    ));
    Ok(AgentRuntime::new(Arc::new(client)))
}

async fn run(cli: &Cli) -> Result<Vec<String>, String> {
    let messages = collect_messages(cli)?;
    let runtime = build_runtime(cli)?;

    let config = EvaluatorConfig::default()
        .with_min_call_spacing(Duration::from_millis(cli.min_spacing_ms))
        .with_max_attempts(cli.max_attempts);
    let evaluator = RiskEvaluator::new(config);
    let state = cli
        .room
        .as_deref()
        .map(EvaluatorState::for_room)
        .unwrap_or_default();

    let incoming: Vec<IncomingMessage> = messages
        .iter()
        .map(|text| IncomingMessage {
            room_id: cli.room.clone(),
            ..IncomingMessage::text(text.as_str())
        })
        .collect();

    let results = join_all(
        incoming
            .iter()
            .map(|message| evaluator.handler(&runtime, message, &state)),
    )
    .await;

    let cache = evaluator.coordinator().cache();
    tracing::debug!(
        "classified {} message(s): {} cached tier(s), {} hit(s)",
        results.len(),
        cache.len(),
        cache.hits()
    );

    messages
        .iter()
        .zip(results)
        .map(|(message, result)| {
            let line = ClassifiedLine {
                message,
                result,
                crisis: KeywordScreen::is_crisis(message),
            };
            serde_json::to_string(&line).map_err(|e| format!("failed to format result: {e}"))
        })
        .collect()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
