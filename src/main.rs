//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `listing_geocoder` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};

use listing_geocoder::cli::{Cli, Command, ConfigAction};
use listing_geocoder::initialization::init_logger_with;
use listing_geocoder::{format_timestamp_ms, BatchOutcome, GeocodingService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // Try loading from current directory first, then from the executable's directory
    if dotenvy::dotenv().is_err() {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    let cli = Cli::parse();

    let log_level = cli.log_level.clone();
    let log_format = cli.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    if let Err(e) = run(cli).await {
        eprintln!("listing_geocoder error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let service = GeocodingService::init(cli.to_config()).await?;

    match cli.command {
        Command::Geocode { batch_size } => {
            let outcome = service.run_batch(batch_size).await?;
            print_outcome(&outcome);
        }
        Command::Retry { max } => {
            let outcome = service.retry_escalated(max).await?;
            print_outcome(&outcome);
        }
        Command::Status => {
            let status = service.status().await?;
            let counts = status.counts;
            println!(
                "Targets: {} total, {} resolved, {} pending, {} escalated ({} awaiting review)",
                counts.total,
                counts.resolved,
                counts.pending,
                counts.escalated,
                status.escalated_unresolved
            );
            println!(
                "Geocoding {} (region {}), batch size {}, {:.1}s between items, {} attempts, retry after {}h",
                if status.settings.enabled { "enabled" } else { "disabled" },
                status.country_code,
                status.settings.batch_size,
                status.settings.delay_seconds,
                status.settings.max_attempts,
                status.settings.retry_failed_after_hours
            );
            println!(
                "Last geocoded: {}",
                format_timestamp_ms(status.last_geocoded_ms)
            );
            if let Some(secs) = status.backoff_remaining_secs {
                println!("Provider back-off: {}s remaining", secs);
            }
        }
        Command::Failed { limit } => {
            let entries = service.list_escalated(limit).await?;
            if entries.is_empty() {
                println!("No escalated targets awaiting review");
            }
            for entry in entries {
                println!(
                    "#{} {:?} ({} attempt{}, last {}){}",
                    entry.target_id,
                    entry.city,
                    entry.attempts,
                    if entry.attempts == 1 { "" } else { "s" },
                    format_timestamp_ms(Some(entry.last_attempt_ms)),
                    if entry.target_geocoded {
                        " [geocoded by retry]"
                    } else {
                        ""
                    }
                );
                if let Some(title) = &entry.title {
                    println!("    title: {}", title);
                }
                if let Some(error) = &entry.error_message {
                    println!("    error: {}", error);
                }
                if let Some(suggested) = entry.suggested {
                    println!("    suggested: {}", suggested);
                }
            }
        }
        Command::Fix { id, lat, lng } => {
            let report = service.manual_fix(id, lat, lng).await?;
            println!(
                "✅ Target {} set to {}{}",
                report.target_id,
                report.coordinates,
                if report.escalation_resolved {
                    " (escalation resolved)"
                } else {
                    ""
                }
            );
        }
        Command::Suggest { id, lat, lng } => {
            let entry = service.suggest(id, lat, lng).await?;
            if let Some(suggested) = entry.suggested {
                println!("Suggestion {} stored for target {}", suggested, entry.target_id);
            }
        }
        Command::Accept { id } => {
            let report = service.accept_suggestion(id).await?;
            println!(
                "✅ Target {} set to suggested {}",
                report.target_id, report.coordinates
            );
        }
        Command::Config { action } => {
            let settings = match action {
                ConfigAction::Show => service.settings().await?,
                ConfigAction::Set { assignment } => {
                    let (key, value) = listing_geocoder::parse_assignment(&assignment)
                        .with_context(|| format!("expected KEY=VALUE, got {:?}", assignment))?;
                    service.update_settings(key, value).await?
                }
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&settings).context("Failed to format settings")?
            );
        }
        Command::History { limit } => {
            for event in service.recent_events(Some(limit)).await? {
                println!(
                    "{} [{}/{}] {}",
                    format_timestamp_ms(Some(event.timestamp_ms)),
                    event.kind,
                    event.status,
                    event.message
                );
            }
        }
        Command::Import { file } => {
            let reader = open_input(&file).await?;
            let report = service
                .import_targets(reader)
                .await
                .with_context(|| format!("Failed to import {}", file.display()))?;
            println!(
                "Imported {} target{} ({} line{} skipped)",
                report.imported,
                if report.imported == 1 { "" } else { "s" },
                report.skipped,
                if report.skipped == 1 { "" } else { "s" }
            );
        }
        Command::Daemon => service.run_daemon().await?,
    }
    Ok(())
}

async fn open_input(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open input file {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn print_outcome(outcome: &BatchOutcome) {
    if outcome.skipped_reason.is_some() {
        println!("⏭️ {}", outcome.summary());
    } else {
        println!("✅ {}", outcome.summary());
    }
}
