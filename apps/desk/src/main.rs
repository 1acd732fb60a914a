use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{config, logs::LogEntry, HttpBackend, Orchestrator, Outcome, UiEvent};
use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Cli;

const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let mut settings = config::load_settings(cli.config.as_deref());
    if let Some(api_base) = &cli.api_base {
        settings.api_base = api_base.clone();
    }
    let backend = HttpBackend::new(&settings).context("invalid backend configuration")?;
    info!(api_base = %backend.api_base(), "using backend");

    let orchestrator = Orchestrator::new(Arc::new(backend));
    let mut events = orchestrator.subscribe_events();

    tokio::spawn(watch_interrupts(Arc::clone(&orchestrator)));

    let status = orchestrator.check_server_status().await;
    info!(?status, "backend status");
    if settings.load_history_on_start && !cli.command.loads_history() {
        if let Err(err) = orchestrator.load_history().await {
            warn!(error = %err, "history unavailable at startup");
        }
    }
    report(&mut events);

    let mut succeeded = true;
    for action in cli.command.plan().await? {
        let name = action.name();
        let result = orchestrator.dispatch(action).await;
        report(&mut events);
        match result {
            Ok(Outcome::Completed) => {}
            Ok(Outcome::Skipped) => warn!(action = name, "action skipped"),
            Err(err) => {
                error!(action = name, error = %err, "action failed");
                succeeded = false;
                break;
            }
        }
    }

    let html = orchestrator.page_html().await;
    match &cli.out {
        Some(path) => {
            tokio::fs::write(path, html)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "page written");
        }
        None => println!("{html}"),
    }

    Ok(succeeded && status.is_online())
}

/// Every Ctrl-C cancels the gated operation in flight; with none in flight the process exits.
async fn watch_interrupts(orchestrator: Arc<Orchestrator>) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if !interrupt(&orchestrator).await {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}

/// Returns whether an in-flight operation absorbed the interrupt.
async fn interrupt(orchestrator: &Orchestrator) -> bool {
    if orchestrator.cancel().await {
        warn!("interrupted, cancelling current operation");
        true
    } else {
        warn!("interrupted");
        false
    }
}

/// Echoes alerts and panel log lines to stderr.
fn report(events: &mut Receiver<UiEvent>) {
    loop {
        match events.try_recv() {
            Ok(UiEvent::Alert(message)) => eprintln!("! {message}"),
            Ok(UiEvent::Log { entry, .. }) => print_entry(&entry),
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "dropped ui events"),
            Err(_) => break,
        }
    }
}

fn print_entry(entry: &LogEntry) {
    eprintln!(
        "[{}] {:<7} {}",
        entry.time,
        entry.level.as_str(),
        entry.message
    );
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn idle_orchestrator() -> Arc<Orchestrator> {
        let backend = HttpBackend::with_timeouts(
            "http://127.0.0.1:9/api",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .expect("backend");
        Orchestrator::new(Arc::new(backend))
    }

    #[tokio::test]
    async fn interrupt_without_operation_in_flight_is_not_absorbed() {
        let orchestrator = idle_orchestrator();
        assert!(!interrupt(&orchestrator).await);
        assert!(!orchestrator.is_busy());
    }
}
