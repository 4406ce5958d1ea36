//! rpn-gen - sequential report number generator
//!
//! Assigns `<pattern>-<NNNN>-<revision>` identifiers to JSON records and
//! keeps the collection's min/max trackers current.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rpn_common::events::EventBus;
use rpn_common::record::JsonRecordStore;
use rpn_common::timer::TokioTimer;
use rpn_common::{AttemptOutcome, FieldStore, Persistence, RpnConfig, TriggerScheduler};
use rpn_gen::{describe_outcome, run_session};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "rpn-gen")]
#[command(about = "Sequential report number generator", long_about = None)]
#[command(version)]
struct Args {
    /// Config file path (overrides RPN_CONFIG and the platform default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RPN_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assign a report number to a record file
    Generate {
        #[arg(short, long)]
        record: PathBuf,

        /// Report rejections as errors instead of failing silently
        #[arg(short, long)]
        interactive: bool,
    },
    /// Compute the next sequence from tracker values
    Next {
        #[arg(long, default_value = "")]
        max: String,

        #[arg(long, default_value = "")]
        default: String,

        #[arg(long)]
        json: bool,
    },
    /// Decompose an identifier into prefix, sequence and revision
    Inspect {
        identifier: String,

        #[arg(long)]
        json: bool,
    },
    /// Edit a record interactively from stdin
    Session {
        #[arg(short, long)]
        record: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = RpnConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting rpn-gen v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match args.command {
        Command::Generate {
            record,
            interactive,
        } => {
            let outcome = rpn_gen::generate(&record, interactive, &config)?;
            println!("{}", describe_outcome(&outcome));
            Ok(match outcome {
                AttemptOutcome::Assigned(_) => ExitCode::SUCCESS,
                AttemptOutcome::Rejected(_) if !interactive => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            })
        }
        Command::Next { max, default, json } => {
            let report = rpn_gen::next(&max, &default)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.next);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Inspect { identifier, json } => {
            let report = rpn_gen::inspect(&identifier)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("prefix:    {}", report.prefix);
                println!("sequence:  {}", report.sequence);
                println!("part:      {}", report.part_number);
                println!(
                    "revision:  {}{}",
                    report.revision,
                    if report.standard_revision { "" } else { " (non-standard)" }
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Session { record } => {
            let store = JsonRecordStore::open(&record)
                .with_context(|| format!("Failed to open record {}", record.display()))?;
            let timer = TokioTimer::from_current()?;
            let scheduler = TriggerScheduler::new(store, timer, &config, EventBus::default());
            info!("Session opened on {}", record.display());

            // Silent attempt in case the record was completed elsewhere
            if let AttemptOutcome::Assigned(assignment) = scheduler.startup() {
                println!("assigned {}", assignment.identifier);
                if let Persistence::Failed(e) = &assignment.persistence {
                    warn!("Record not saved: {}", e);
                }
            }

            let input = tokio::io::BufReader::new(tokio::io::stdin());
            let mut out = std::io::stdout();
            run_session(&scheduler, input, &mut out).await?;

            // Keep field edits made without an assignment
            if let Err(e) = scheduler.with_store_mut(|store| store.save()) {
                error!("Failed to save {}: {}", record.display(), e);
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
