use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{Action, FileCandidate};
use shared::domain::{FileKind, Tab};

#[derive(Parser, Debug)]
#[command(name = "desk", about = "Invoice and purchase order processing desk")]
pub struct Cli {
    /// Settings file; defaults to ./desk.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Overrides the configured backend base URL.
    #[arg(long, global = true)]
    pub api_base: Option<String>,
    /// Write the rendered page here instead of stdout.
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether the backend is reachable.
    Status,
    /// Upload an invoice and run the full pipeline.
    Process { file: PathBuf },
    /// Upload an invoice and only extract its fields.
    Extract { file: PathBuf },
    /// Upload an invoice and reconcile it against a purchase order.
    Reconcile {
        file: PathBuf,
        #[arg(long)]
        nro_oc: Option<String>,
    },
    /// Upload a purchase order and look up matching providers.
    SearchProvider { file: PathBuf },
    /// List processed invoices.
    History,
    /// Show a stored processing result.
    Show { filename: String },
}

impl Command {
    /// History is loaded by the command itself.
    pub fn loads_history(&self) -> bool {
        matches!(self, Command::History)
    }

    pub async fn plan(&self) -> Result<Vec<Action>> {
        Ok(match self {
            Command::Status => Vec::new(),
            Command::Process { file } => {
                vec![select(FileKind::Invoice, file).await?, Action::ProcessInvoice]
            }
            Command::Extract { file } => {
                vec![select(FileKind::Invoice, file).await?, Action::ExtractOnly]
            }
            Command::Reconcile { file, nro_oc } => vec![
                select(FileKind::Invoice, file).await?,
                Action::ReconcileInvoice {
                    nro_oc: nro_oc.clone(),
                },
            ],
            Command::SearchProvider { file } => vec![
                Action::SwitchTab(Tab::PurchaseOrder),
                select(FileKind::PurchaseOrder, file).await?,
                Action::SearchProvider,
            ],
            Command::History => vec![Action::SwitchTab(Tab::History), Action::LoadHistory],
            Command::Show { filename } => vec![Action::ViewHistoryItem {
                filename: filename.clone(),
            }],
        })
    }
}

async fn select(kind: FileKind, path: &Path) -> Result<Action> {
    let file = FileCandidate::from_path(path)
        .await
        .with_context(|| format!("cannot use {} as {}", path.display(), kind.label()))?;
    Ok(Action::SelectFile { kind, file })
}
