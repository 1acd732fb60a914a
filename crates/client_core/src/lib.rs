use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use shared::{
    domain::{FileKind, ServerStatus, Tab},
    protocol::UploadAck,
};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod backend;
pub mod config;
pub mod error;
pub mod logs;
pub mod render;
pub mod session;

pub use backend::{HttpBackend, InvoiceBackend};
pub use error::{ClientError, FileRejection};
pub use render::Node;
pub use session::{Controls, FileCandidate, SessionState};

use logs::{LogEntry, LogLevel, LogPanel};

const REJECTED_FILE_ALERT: &str = "Invalid file. Only PDF, PNG, JPG (max 16MB)";

/// Which on-screen log panel an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Invoice,
    PurchaseOrder,
}

/// Everything the page shows besides the selection itself.
#[derive(Debug, Clone, Default)]
pub struct Screen {
    pub status: ServerStatus,
    pub active_tab: Tab,
    pub loading: Option<String>,
    pub invoice_logs: LogPanel,
    pub purchase_order_logs: LogPanel,
    pub invoice_result: Option<Node>,
    pub provider_result: Option<Node>,
    pub history: Option<Node>,
}

impl Screen {
    fn logs_mut(&mut self, panel: Panel) -> &mut LogPanel {
        match panel {
            Panel::Invoice => &mut self.invoice_logs,
            Panel::PurchaseOrder => &mut self.purchase_order_logs,
        }
    }

    fn result_mut(&mut self, panel: Panel) -> &mut Option<Node> {
        match panel {
            Panel::Invoice => &mut self.invoice_result,
            Panel::PurchaseOrder => &mut self.provider_result,
        }
    }
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Blocking user notification.
    Alert(String),
    Log { panel: Panel, entry: LogEntry },
    BusyChanged { busy: bool, label: Option<String> },
    SelectionChanged {
        kind: FileKind,
        filename: Option<String>,
        controls: Controls,
    },
    ResultRendered(Panel),
    HistoryRendered,
    StatusChanged(ServerStatus),
    TabChanged(Tab),
}

/// One variant per user-reachable operation.
#[derive(Debug, Clone)]
pub enum Action {
    SelectFile { kind: FileKind, file: FileCandidate },
    RemoveFile(FileKind),
    ProcessInvoice,
    ExtractOnly,
    ReconcileInvoice { nro_oc: Option<String> },
    SearchProvider,
    LoadHistory,
    ViewHistoryItem { filename: String },
    CheckServerStatus,
    SwitchTab(Tab),
    Cancel,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SelectFile { .. } => "select_file",
            Action::RemoveFile(_) => "remove_file",
            Action::ProcessInvoice => "process_invoice",
            Action::ExtractOnly => "extract_only",
            Action::ReconcileInvoice { .. } => "reconcile_invoice",
            Action::SearchProvider => "search_provider",
            Action::LoadHistory => "load_history",
            Action::ViewHistoryItem { .. } => "view_history_item",
            Action::CheckServerStatus => "check_server_status",
            Action::SwitchTab(_) => "switch_tab",
            Action::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Preconditions not met (nothing selected, or another operation in flight).
    Skipped,
}

struct OrchestratorState {
    session: SessionState,
    screen: Screen,
    inflight: Option<CancellationToken>,
}

/// Releases the busy flag on every exit path.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct Flight<'a> {
    _guard: BusyGuard<'a>,
    token: CancellationToken,
}

pub struct Orchestrator {
    backend: Arc<dyn InvoiceBackend>,
    busy: AtomicBool,
    inner: Mutex<OrchestratorState>,
    events: broadcast::Sender<UiEvent>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn InvoiceBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            busy: AtomicBool::new(false),
            inner: Mutex::new(OrchestratorState {
                session: SessionState::default(),
                screen: Screen::default(),
                inflight: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn session(&self) -> SessionState {
        self.inner.lock().await.session.clone()
    }

    pub async fn screen(&self) -> Screen {
        self.inner.lock().await.screen.clone()
    }

    pub async fn page_html(&self) -> String {
        let guard = self.inner.lock().await;
        render::page_html(&guard.session, &guard.screen)
    }

    pub async fn dispatch(&self, action: Action) -> Result<Outcome, ClientError> {
        debug!(action = action.name(), "dispatching ui action");
        match action {
            Action::SelectFile { kind, file } => self.select_file(kind, file).await,
            Action::RemoveFile(kind) => {
                self.remove_file(kind).await;
                Ok(Outcome::Completed)
            }
            Action::ProcessInvoice => self.process_invoice().await,
            Action::ExtractOnly => self.extract_only().await,
            Action::ReconcileInvoice { nro_oc } => self.reconcile_invoice(nro_oc).await,
            Action::SearchProvider => self.search_provider().await,
            Action::LoadHistory => self.load_history().await,
            Action::ViewHistoryItem { filename } => self.view_history_item(&filename).await,
            Action::CheckServerStatus => {
                self.check_server_status().await;
                Ok(Outcome::Completed)
            }
            Action::SwitchTab(tab) => {
                self.switch_tab(tab).await;
                Ok(Outcome::Completed)
            }
            Action::Cancel => Ok(if self.cancel().await {
                Outcome::Completed
            } else {
                Outcome::Skipped
            }),
        }
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.events.send(event);
    }

    fn alert(&self, message: impl Into<String>) {
        self.emit(UiEvent::Alert(message.into()));
    }

    async fn log(&self, panel: Panel, level: LogLevel, message: impl Into<String>) {
        let entry = {
            let mut guard = self.inner.lock().await;
            guard.screen.logs_mut(panel).push(level, message)
        };
        if let Some(entry) = entry {
            self.emit(UiEvent::Log { panel, entry });
        }
    }

    /// Logs to the panel and alerts; the error is handed back for the caller.
    async fn fail(&self, panel: Panel, context: &str, err: ClientError) -> ClientError {
        let message = format!("{context}: {err}");
        warn!(error = %err, "{context}");
        self.log(panel, LogLevel::Error, message.clone()).await;
        self.alert(message);
        err
    }

    async fn selected_filename(&self, kind: FileKind) -> Option<String> {
        let guard = self.inner.lock().await;
        guard.session.filename(kind).map(str::to_string)
    }

    /// Claims the busy flag, shows the loading label and clears the panel.
    async fn begin(&self, panel: Panel, label: &str) -> Option<Flight<'_>> {
        let guard = BusyGuard::acquire(&self.busy)?;
        let token = CancellationToken::new();
        {
            let mut state = self.inner.lock().await;
            state.inflight = Some(token.clone());
            state.screen.loading = Some(label.to_string());
            state.screen.logs_mut(panel).reset();
            *state.screen.result_mut(panel) = None;
        }
        self.emit(UiEvent::BusyChanged {
            busy: true,
            label: Some(label.to_string()),
        });
        Some(Flight {
            _guard: guard,
            token,
        })
    }

    async fn finish(&self, flight: Flight<'_>) {
        {
            let mut state = self.inner.lock().await;
            state.inflight = None;
            state.screen.loading = None;
        }
        drop(flight);
        self.emit(UiEvent::BusyChanged {
            busy: false,
            label: None,
        });
    }

    async fn run<T>(
        flight: &Flight<'_>,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        tokio::select! {
            biased;
            _ = flight.token.cancelled() => Err(ClientError::Cancelled),
            result = request => result,
        }
    }

    async fn show_result(&self, panel: Panel, node: Node) {
        {
            let mut state = self.inner.lock().await;
            *state.screen.result_mut(panel) = Some(node);
        }
        self.emit(UiEvent::ResultRendered(panel));
    }

    pub async fn select_file(
        &self,
        kind: FileKind,
        file: FileCandidate,
    ) -> Result<Outcome, ClientError> {
        if let Err(rejection) = file.validate() {
            warn!(kind = kind.label(), filename = %file.filename, %rejection, "file rejected");
            self.alert(format!("{REJECTED_FILE_ALERT}: {rejection}"));
            return Err(rejection.into());
        }

        let controls = {
            let mut state = self.inner.lock().await;
            state.session.set(kind, file.clone());
            state.session.controls()
        };
        info!(kind = kind.label(), filename = %file.filename, "file selected");
        self.emit(UiEvent::SelectionChanged {
            kind,
            filename: Some(file.filename.clone()),
            controls,
        });

        self.upload(kind, &file).await?;
        Ok(Outcome::Completed)
    }

    pub async fn upload(
        &self,
        kind: FileKind,
        file: &FileCandidate,
    ) -> Result<UploadAck, ClientError> {
        match self.backend.upload(kind, file).await {
            Ok(ack) => {
                info!(
                    kind = kind.label(),
                    filename = %file.filename,
                    stored_as = ack.factura.as_deref().unwrap_or_default(),
                    "file uploaded"
                );
                Ok(ack)
            }
            Err(err) => {
                warn!(kind = kind.label(), filename = %file.filename, error = %err, "upload failed");
                self.alert(format!("Failed to upload file: {err}"));
                Err(err)
            }
        }
    }

    pub async fn remove_file(&self, kind: FileKind) {
        let controls = {
            let mut state = self.inner.lock().await;
            state.session.clear(kind);
            state.session.controls()
        };
        self.emit(UiEvent::SelectionChanged {
            kind,
            filename: None,
            controls,
        });
    }

    pub async fn process_invoice(&self) -> Result<Outcome, ClientError> {
        let Some(filename) = self.selected_filename(FileKind::Invoice).await else {
            return Ok(Outcome::Skipped);
        };
        let Some(flight) = self
            .begin(Panel::Invoice, "Processing full invoice...")
            .await
        else {
            return Ok(Outcome::Skipped);
        };
        info!(%filename, "processing invoice");

        let outcome = match Self::run(&flight, self.backend.process(&filename)).await {
            Ok(result) => {
                let level = if result.success {
                    LogLevel::Success
                } else {
                    LogLevel::Warning
                };
                self.log(Panel::Invoice, level, format!("Processed {filename}"))
                    .await;
                self.show_result(Panel::Invoice, render::process_result(&result))
                    .await;
                Ok(Outcome::Completed)
            }
            Err(err) => Err(self.fail(Panel::Invoice, "Processing failed", err).await),
        };

        // History refreshes after busy is released.
        self.finish(flight).await;
        if outcome.is_ok() {
            if let Err(err) = self.load_history().await {
                warn!(error = %err, "history refresh after processing failed");
            }
        }
        outcome
    }

    pub async fn extract_only(&self) -> Result<Outcome, ClientError> {
        let Some(filename) = self.selected_filename(FileKind::Invoice).await else {
            return Ok(Outcome::Skipped);
        };
        let Some(flight) = self
            .begin(Panel::Invoice, "Extracting invoice data...")
            .await
        else {
            return Ok(Outcome::Skipped);
        };
        info!(%filename, "extracting invoice data");

        let outcome = match Self::run(&flight, self.backend.extract(&filename)).await {
            Ok(result) => {
                self.show_result(Panel::Invoice, render::extraction(&result.data))
                    .await;
                Ok(Outcome::Completed)
            }
            Err(err) => Err(self.fail(Panel::Invoice, "Extraction failed", err).await),
        };

        self.finish(flight).await;
        outcome
    }

    pub async fn reconcile_invoice(&self, nro_oc: Option<String>) -> Result<Outcome, ClientError> {
        let Some(filename) = self.selected_filename(FileKind::Invoice).await else {
            return Ok(Outcome::Skipped);
        };
        let Some(flight) = self
            .begin(Panel::Invoice, "Reconciling invoice with purchase order...")
            .await
        else {
            return Ok(Outcome::Skipped);
        };
        let nro_oc = nro_oc.filter(|n| !n.trim().is_empty());
        info!(%filename, nro_oc = nro_oc.as_deref().unwrap_or("auto"), "reconciling invoice");

        let outcome = match Self::run(
            &flight,
            self.backend.reconcile(&filename, nro_oc.as_deref()),
        )
        .await
        {
            Ok(result) => {
                self.show_result(Panel::Invoice, render::reconciliation(&result))
                    .await;
                Ok(Outcome::Completed)
            }
            Err(err) => Err(self.fail(Panel::Invoice, "Reconciliation failed", err).await),
        };

        self.finish(flight).await;
        outcome
    }

    pub async fn search_provider(&self) -> Result<Outcome, ClientError> {
        let Some(filename) = self.selected_filename(FileKind::PurchaseOrder).await else {
            return Ok(Outcome::Skipped);
        };
        let Some(flight) = self
            .begin(Panel::PurchaseOrder, "Searching provider...")
            .await
        else {
            return Ok(Outcome::Skipped);
        };
        info!(%filename, "searching provider");
        self.log(
            Panel::PurchaseOrder,
            LogLevel::Info,
            "Starting automatic provider search...",
        )
        .await;

        let outcome = match Self::run(&flight, self.backend.search_provider(&filename)).await {
            Ok(result) => {
                for (level, line) in render::provider_search_log(&result) {
                    self.log(Panel::PurchaseOrder, level, line).await;
                }
                self.show_result(Panel::PurchaseOrder, render::provider_results(&result))
                    .await;
                Ok(Outcome::Completed)
            }
            Err(err) => Err(self
                .fail(Panel::PurchaseOrder, "Provider search failed", err)
                .await),
        };

        self.finish(flight).await;
        outcome
    }

    pub async fn load_history(&self) -> Result<Outcome, ClientError> {
        let fetched = self.backend.history().await;
        let (node, outcome) = match fetched {
            Ok(entries) => {
                debug!(entries = entries.len(), "history loaded");
                (render::history(&entries), Ok(Outcome::Completed))
            }
            Err(err) => {
                warn!(error = %err, "failed to load history");
                (render::history_unavailable(), Err(err))
            }
        };
        {
            let mut state = self.inner.lock().await;
            state.screen.history = Some(node);
        }
        self.emit(UiEvent::HistoryRendered);
        outcome
    }

    pub async fn view_history_item(&self, filename: &str) -> Result<Outcome, ClientError> {
        match self.backend.result(filename).await {
            Ok(result) => {
                self.switch_tab(Tab::Invoice).await;
                self.show_result(Panel::Invoice, render::process_result(&result))
                    .await;
                Ok(Outcome::Completed)
            }
            Err(err) => {
                warn!(%filename, error = %err, "failed to load stored result");
                self.alert(format!("Failed to load result {filename}: {err}"));
                Err(err)
            }
        }
    }

    /// Never fails; an unreachable backend is reported as offline.
    pub async fn check_server_status(&self) -> ServerStatus {
        let status = match self.backend.health().await {
            Ok(()) => ServerStatus::Online,
            Err(err) => {
                warn!(error = %err, "health check failed");
                ServerStatus::Offline
            }
        };
        {
            let mut state = self.inner.lock().await;
            state.screen.status = status;
        }
        self.emit(UiEvent::StatusChanged(status));
        status
    }

    pub async fn switch_tab(&self, tab: Tab) {
        {
            let mut state = self.inner.lock().await;
            state.screen.active_tab = tab;
        }
        self.emit(UiEvent::TabChanged(tab));
    }

    /// Cancels the in-flight operation, if any.
    pub async fn cancel(&self) -> bool {
        let state = self.inner.lock().await;
        match &state.inflight {
            Some(token) => {
                info!("cancelling in-flight operation");
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
