//! Main entry point for the xlsalvage CLI application.
//!
//! Reads each wrapped export, runs the salvage pipeline over the batch,
//! writes recovered workbooks next to their inputs (or into `-d DIR`) and
//! prints a per-input report.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use xlsalvage::io::{input_paths, load_input, output_paths, persist_recovered};
use xlsalvage::recovery::InputSummary;
use xlsalvage::{BatchReport, Cli, NamedStream, recover_batch};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli);

    let paths = input_paths(cli.sample_dir.as_deref(), &cli.files);
    if paths.is_empty() {
        eprintln!("No inputs given. Pass FILES or -s DIR (see --help).");
        return Ok(ExitCode::SUCCESS);
    }

    // Read failures become report lines, not aborts.
    let mut inputs = Vec::with_capacity(paths.len());
    for path in &paths {
        let name = path.display().to_string();
        match load_input(path).await {
            Ok(bytes) => {
                debug!(input = %name, bytes = bytes.len(), "loaded input");
                inputs.push(NamedStream::new(name, bytes));
            }
            Err(err) => inputs.push(NamedStream::unreadable(name, err)),
        }
    }

    let config = cli.salvage_config();
    let mut report = tokio::task::spawn_blocking(move || recover_batch(inputs, &config))
        .await
        .context("recovery task panicked")?;

    let saved = if cli.dry_run {
        Vec::new()
    } else {
        let targets = output_paths(&paths, cli.output_dir.as_deref());
        persist_recovered(&mut report, &targets).await
    };

    print_report(&report, &saved, &cli)?;

    if report.successes() == 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("xlsalvage={}", cli.log_level())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_report(report: &BatchReport, saved: &[PathBuf], cli: &Cli) -> Result<()> {
    if cli.json {
        let summaries: Vec<InputSummary<'_>> = report.summaries();
        let saved: Vec<String> = saved.iter().map(|p| p.display().to_string()).collect();
        let doc = serde_json::json!({
            "recovered": report.successes(),
            "total": report.total(),
            "inputs": summaries,
            "saved": saved,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{}", report);
    if !cli.is_quiet() {
        for path in saved {
            println!("saved: {}", path.display());
        }
    }
    Ok(())
}
