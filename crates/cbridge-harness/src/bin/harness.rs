//! CLI entrypoint for the cbridge harness.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cbridge_harness::report::file_sha256;
use cbridge_harness::{HarnessError, leak_check, marshal, scenario};
use cbridge_membrane::{
    BoundaryConfig, BoundaryContext, DataRecord, LogEmitter, OverflowPolicy, ViolationMode,
};
use clap::{Parser, Subcommand};

/// Drive the cbridge boundary end to end.
#[derive(Debug, Parser)]
#[command(name = "cbridge-harness")]
#[command(about = "End-to-end harness for the cbridge boundary layer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the wrapper scenario against the reference foreign library.
    Scenario {
        /// Write the structured JSONL log here.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Print markdown instead of JSON.
        #[arg(long)]
        markdown: bool,
    },
    /// Acquire and release from several threads, then audit the registry.
    LeakCheck {
        #[arg(long, default_value_t = 4)]
        threads: usize,
        #[arg(long, default_value_t = 1000)]
        iterations: usize,
        /// Report path (JSON). Printed to stdout when absent.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write the structured JSONL log here.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Marshal a data record and print its foreign bytes.
    Marshal {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        id: i32,
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        value: f64,
        /// Refuse over-long names instead of truncating them.
        #[arg(long)]
        reject: bool,
    },
}

fn context(
    config: BoundaryConfig,
    log: Option<&Path>,
    run_id: &str,
) -> Result<Arc<BoundaryContext>, HarnessError> {
    let emitter = match log {
        Some(path) => LogEmitter::to_file(path, run_id, config.log_level)?,
        None => LogEmitter::discard(),
    };
    Ok(BoundaryContext::with_log(config, emitter))
}

fn log_digest(ctx: &BoundaryContext, log: Option<&Path>) -> Result<Option<String>, HarnessError> {
    match log {
        Some(path) => {
            ctx.log().flush()?;
            Ok(Some(file_sha256(path)?))
        }
        None => Ok(None),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Scenario { log, markdown } => {
            // The scenario commits violations on purpose; they must not abort.
            let config = BoundaryConfig::from_env().with_violations(ViolationMode::Report);
            let ctx = context(config, log.as_deref(), "scenario")?;
            let mut report = scenario::run_scenario(&ctx, cbridge_abi::surface());
            report.log_sha256 = log_digest(&ctx, log.as_deref())?;

            if markdown {
                println!("{}", report.to_markdown());
            } else {
                println!("{}", report.to_json());
            }
            if !report.passed() {
                return Err("scenario failed".into());
            }
        }
        Command::LeakCheck {
            threads,
            iterations,
            output,
            log,
        } => {
            let ctx = context(BoundaryConfig::from_env(), log.as_deref(), "leak-check")?;
            eprintln!("Leak check: {threads} threads x {iterations} iterations");
            let mut report =
                leak_check::run_leak_check(&ctx, cbridge_abi::surface(), threads, iterations)?;
            report.log_sha256 = log_digest(&ctx, log.as_deref())?;

            let json = report.to_json();
            match output {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    eprintln!("Report written to {}", path.display());
                }
                None => println!("{json}"),
            }
            if report.live > 0 {
                return Err(HarnessError::LeaksRemain { live: report.live }.into());
            }
        }
        Command::Marshal {
            id,
            name,
            value,
            reject,
        } => {
            let policy = if reject {
                OverflowPolicy::Reject
            } else {
                OverflowPolicy::Truncate
            };
            let record = DataRecord {
                id,
                name,
                value,
                processed: false,
            };
            let report = marshal::marshal_record(&record, policy)?;
            println!("{}", report.to_json());
        }
    }

    Ok(())
}
