use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use docmerit::config::{self, AnalysisConfig};
use docmerit::core_state::CoreState;
use docmerit::db::AUDIT_RETENTION_DAYS;
use docmerit::models::{CaseRequest, Recommendation};

#[derive(Parser)]
#[command(name = config::APP_NAME, version = config::APP_VERSION)]
#[command(about = "Analyse case documents and score case merit")]
struct Cli {
    /// JSON config file. Falls back to $DOCMERIT_CONFIG, then built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every document of a case, then merit analysis.
    Analyze {
        /// Case request JSON: case_id, documents, context.
        case: PathBuf,
    },
    /// Re-run merit from stored document results.
    RetryMerit { case: PathBuf },
    /// Record a reviewer decision against the latest merit result.
    Override {
        #[arg(long)]
        case_id: String,
        #[arg(long)]
        reviewer: String,
        #[arg(long, value_parser = parse_decision)]
        decision: Recommendation,
        #[arg(long)]
        rationale: String,
    },
    /// Report PHI categories found in a text file without changing it.
    Scan { file: PathBuf },
    /// Model usage totals for a case.
    Usage { case_id: String },
    /// Delete audit records older than the retention period.
    PruneAudit {
        #[arg(long, default_value_t = AUDIT_RETENTION_DAYS)]
        days: i64,
    },
}

fn parse_decision(raw: &str) -> Result<Recommendation, String> {
    raw.parse().map_err(|e: docmerit::db::DatabaseError| e.to_string())
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, config::ConfigError> {
    match path {
        Some(path) => AnalysisConfig::load(path),
        None => AnalysisConfig::from_env(),
    }
}

fn read_case(path: &Path) -> Result<CaseRequest, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling case analysis");
            token.cancel();
        }
    });
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_deref())?;

    if let Command::Scan { file } = &cli.command {
        let redactor = docmerit::pipeline::redaction::PhiRedactor::new(&config.redaction)?;
        let text = std::fs::read_to_string(file)?;
        return print_json(&redactor.scan(&text));
    }

    let state = CoreState::build(config)?;
    match cli.command {
        Command::Analyze { case } => {
            let request = read_case(&case)?;
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());
            let outcome = state.runner.analyze_case(&request, cancel).await;
            print_json(&outcome)
        }
        Command::RetryMerit { case } => {
            let request = read_case(&case)?;
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());
            print_json(&state.runner.retry_merit(&request, cancel).await)
        }
        Command::Override {
            case_id,
            reviewer,
            decision,
            rationale,
        } => print_json(&state.override_latest(&case_id, &reviewer, decision, &rationale)?),
        Command::Usage { case_id } => print_json(&state.store.usage_totals(&case_id)?),
        Command::PruneAudit { days } => {
            let deleted = state.store.prune_audit_log(days)?;
            println!("{deleted}");
            Ok(())
        }
        Command::Scan { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    docmerit::init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "docmerit failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
