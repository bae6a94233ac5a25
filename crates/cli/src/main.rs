//! Operator entry point for the vectorsync pipeline.
//!
//! Run with: `vectorsync <command>`
//!
//! Results are printed to stdout as JSON; logs go to stderr.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use vectorsync_core::SyncOrchestrator;
use vectorsync_domain::{AppConfig, SyncProgress};
use vectorsync_infra::{
    config, init_logging, HttpEmbeddingClient, JsonRpcSourceApi, QdrantClient, ResilientClient,
    VectorGateway,
};

enum Command {
    Full,
    Incremental { since: Option<DateTime<Utc>> },
    Record { id: i64 },
    Status,
    Help,
}

fn main() -> ExitCode {
    let command = match parse_args(env::args().skip(1).collect()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            print_help();
            return ExitCode::FAILURE;
        }
    };
    if matches!(command, Command::Help) {
        print_help();
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(command)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Command failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("vectorsync");
    println!();
    println!("USAGE:");
    println!("    vectorsync <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    full                          Re-index every active record");
    println!("    incremental [--since <TIME>]  Re-index records changed since TIME (RFC 3339)");
    println!("    record <ID>                   Re-index or remove one record");
    println!("    status                        Print pipeline health");
    println!("    help                          Show this help message");
    println!();
    println!("Configuration comes from VECTORSYNC_* variables (a .env file is read if");
    println!("present) or from vectorsync.toml / VECTORSYNC_CONFIG.");
}

fn parse_args(args: Vec<String>) -> anyhow::Result<Command> {
    let mut args = args.into_iter();
    let command = match args.next().as_deref() {
        Some("full") => Command::Full,
        Some("incremental") => {
            let since = match (args.next().as_deref(), args.next()) {
                (None, _) => None,
                (Some("--since"), Some(raw)) => Some(
                    DateTime::parse_from_rfc3339(&raw)
                        .with_context(|| format!("invalid --since timestamp: {raw}"))?
                        .with_timezone(&Utc),
                ),
                (Some(flag), _) => bail!("expected --since <TIME>, got {flag}"),
            };
            Command::Incremental { since }
        }
        Some("record") => {
            let raw = args.next().ok_or_else(|| anyhow!("record requires an id"))?;
            let id = raw.parse().with_context(|| format!("invalid record id: {raw}"))?;
            Command::Record { id }
        }
        Some("status") => Command::Status,
        Some("help" | "--help" | "-h") | None => Command::Help,
        Some(unknown) => bail!("Unknown command: {unknown}"),
    };
    if let Some(extra) = args.next() {
        bail!("unexpected argument: {extra}");
    }
    Ok(command)
}

/// Runs `command`; `Ok(false)` means it completed but reported failure.
async fn run(command: Command) -> anyhow::Result<bool> {
    let _ = dotenvy::dotenv();
    let config = config::load().context("loading configuration")?;
    init_logging(&config.logging);

    let orchestrator = build_orchestrator(&config)?;
    let report = |progress: &SyncProgress| {
        tracing::info!(
            phase = %progress.phase,
            batch = progress.current_batch,
            of = progress.total_batches,
            records = progress.records_processed,
            percent = progress.percent_complete,
            "progress"
        );
    };

    match command {
        Command::Full => {
            let result = orchestrator.full_sync(Some(&report)).await;
            print_json(&result)?;
            Ok(result.success)
        }
        Command::Incremental { since } => {
            let result = orchestrator.incremental_sync(since, Some(&report)).await;
            print_json(&result)?;
            Ok(result.success)
        }
        Command::Record { id } => {
            let outcome = orchestrator.sync_record(id).await?;
            print_json(&outcome)?;
            Ok(true)
        }
        Command::Status => {
            let status = orchestrator.status().await;
            print_json(&status)?;
            Ok(status.healthy)
        }
        Command::Help => Ok(true),
    }
}

fn build_orchestrator(config: &AppConfig) -> anyhow::Result<SyncOrchestrator> {
    let source_api = JsonRpcSourceApi::new(config.source.clone())?;
    let source = ResilientClient::new(
        Arc::new(source_api),
        &config.source,
        &config.cache,
        &config.breakers.source,
    )?;

    let store = QdrantClient::new(&config.vector_store)?;
    let gateway =
        VectorGateway::new(Arc::new(store), &config.vector_store, &config.breakers.vector_store)?;

    let embedder = HttpEmbeddingClient::new(&config.embedding)?;

    Ok(SyncOrchestrator::new(Arc::new(source), Arc::new(embedder), Arc::new(gateway), config.sync))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn parses_commands() {
        assert!(matches!(parse_args(args(&["full"])), Ok(Command::Full)));
        assert!(matches!(parse_args(args(&[])), Ok(Command::Help)));
        assert!(matches!(parse_args(args(&["record", "42"])), Ok(Command::Record { id: 42 })));
        assert!(matches!(
            parse_args(args(&["incremental"])),
            Ok(Command::Incremental { since: None })
        ));
    }

    #[test]
    fn parses_since_timestamp() {
        let Ok(Command::Incremental { since: Some(since) }) =
            parse_args(args(&["incremental", "--since", "2024-05-01T08:00:00+02:00"]))
        else {
            panic!("expected incremental with since");
        };
        assert_eq!(since.to_rfc3339(), "2024-05-01T06:00:00+00:00");
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(args(&["record"])).is_err());
        assert!(parse_args(args(&["record", "abc"])).is_err());
        assert!(parse_args(args(&["incremental", "--since", "yesterday"])).is_err());
        assert!(parse_args(args(&["status", "extra"])).is_err());
        assert!(parse_args(args(&["rebuild"])).is_err());
    }
}
