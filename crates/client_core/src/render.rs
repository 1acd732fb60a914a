//! Pure rendering from backend payloads to a view tree, and from the tree to HTML.

use std::ops::Range;

use serde_json::Value;
use shared::{
    domain::{FileKind, ServerStatus, Tab},
    protocol::{
        HistoryEntry, ProcessResult, Provider, ProviderSearchResult, PurchaseOrderSummary,
        ReconciliationResult,
    },
};

use crate::{
    logs::{LogLevel, LogPanel},
    session::SessionState,
    Screen,
};

pub const NOT_AVAILABLE: &str = "N/A";
pub const UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Fragment(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: &'static str,
    pub classes: Vec<String>,
    pub attrs: Vec<(&'static str, String)>,
    pub children: Vec<Node>,
}

pub fn el(tag: &'static str) -> Element {
    Element {
        tag,
        classes: Vec::new(),
        attrs: Vec::new(),
        children: Vec::new(),
    }
}

pub fn text(value: impl Into<String>) -> Node {
    Node::Text(value.into())
}

impl Element {
    pub fn class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        if !class.is_empty() {
            self.classes.push(class);
        }
        self
    }

    pub fn class_if(self, condition: bool, class: &str) -> Self {
        if condition {
            self.class(class)
        } else {
            self
        }
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(nodes);
        self
    }

    pub fn text(self, value: impl Into<String>) -> Self {
        self.child(text(value))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }
}

impl From<Element> for Node {
    fn from(value: Element) -> Self {
        Node::Element(value)
    }
}

impl Node {
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(value) => out.push_str(&escape(value)),
            Node::Fragment(nodes) => nodes.iter().for_each(|node| node.write_html(out)),
            Node::Element(element) => {
                out.push('<');
                out.push_str(element.tag);
                if !element.classes.is_empty() {
                    out.push_str(" class=\"");
                    out.push_str(&escape(&element.classes.join(" ")));
                    out.push('"');
                }
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape(value));
                    out.push('"');
                }
                out.push('>');
                if is_void(element.tag) {
                    return;
                }
                for child in &element.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(element.tag);
                out.push('>');
            }
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(value) => out.push_str(value),
            Node::Fragment(nodes) => nodes.iter().for_each(|node| node.collect_text(out)),
            Node::Element(element) => element
                .children
                .iter()
                .for_each(|node| node.collect_text(out)),
        }
    }

    pub fn find_by_class(&self, class: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.walk(&mut |element| {
            if element.has_class(class) {
                found.push(element);
            }
        });
        found
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.walk(&mut |element| {
            if element.tag == tag {
                found.push(element);
            }
        });
        found
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        match self {
            Node::Text(_) => {}
            Node::Fragment(nodes) => nodes.iter().for_each(|node| node.walk(visit)),
            Node::Element(element) => {
                visit(element);
                element.children.iter().for_each(|node| node.walk(visit));
            }
        }
    }
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "meta" | "br" | "hr" | "img" | "input" | "link")
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// `YYYYMMDD_HHMMSS` to `DD/MM/YYYY HH:MM`; anything not 15 characters long is returned as is.
pub fn format_timestamp(timestamp: &str) -> String {
    let chars: Vec<char> = timestamp.chars().collect();
    if chars.len() != 15 {
        return timestamp.to_string();
    }
    let part = |range: Range<usize>| chars[range].iter().collect::<String>();
    format!(
        "{}/{}/{} {}:{}",
        part(6..8),
        part(4..6),
        part(0..4),
        part(9..11),
        part(11..13)
    )
}

/// Two decimals, halves rounded away from zero; a value that rounds to zero has no sign.
pub fn format_money(amount: f64) -> String {
    let cents = (amount * 100.0).round();
    let sign = if cents < 0.0 { "-" } else { "" };
    let cents = cents.abs();
    format!(
        "${sign}{}.{:02}",
        (cents / 100.0).trunc(),
        (cents % 100.0) as u64
    )
}

pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn or_placeholder<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(placeholder)
}

fn json_block(title: &str, value: &Value) -> [Node; 2] {
    [
        el("h4").text(title).into(),
        el("pre").text(pretty_json(value)).into(),
    ]
}

pub fn process_result(result: &ProcessResult) -> Node {
    let mut summary = el("div").class("result-summary");

    summary = if result.success {
        summary.child(
            el("div")
                .class("alert")
                .class("alert-success")
                .text("Invoice processed successfully"),
        )
    } else {
        summary.child(
            el("div")
                .class("alert")
                .class("alert-error")
                .text("Invoice processing failed"),
        )
    };

    if let Some(extraction) = &result.extraction {
        summary = summary.children(json_block("Extracted data", extraction));
    }

    if let Some(reconciliation) = &result.reconciliation {
        summary = summary.children(json_block("Reconciliation", reconciliation));
    }

    if let Some(database) = &result.database {
        summary = summary.child(el("h4").text("Database")).child(
            el("p")
                .class("db-message")
                .text(or_placeholder(database.message.as_deref(), NOT_AVAILABLE)),
        );
    }

    if !result.errors.is_empty() {
        let items = result
            .errors
            .iter()
            .map(|error| Node::from(el("li").class("error-item").text(error.as_str())));
        summary = summary
            .child(el("h4").text("Errors"))
            .child(el("ul").class("error-list").children(items));
    }

    summary.into()
}

pub fn extraction(data: &Value) -> Node {
    el("div")
        .class("result-summary")
        .children(json_block("Extracted data", data))
        .into()
}

pub fn reconciliation(result: &ReconciliationResult) -> Node {
    let banner = if result.success {
        el("div")
            .class("alert")
            .class("alert-success")
            .text("Reconciliation completed")
    } else {
        el("div")
            .class("alert")
            .class("alert-error")
            .text("Reconciliation reported problems")
    };
    el("div")
        .class("result-summary")
        .child(banner)
        .children(json_block("Reconciliation", &result.data))
        .into()
}

pub fn provider_results(result: &ProviderSearchResult) -> Node {
    if !result.success {
        return el("div")
            .class("alert")
            .class("alert-warning")
            .text(or_placeholder(result.message.as_deref(), "No provider found"))
            .into();
    }

    let labeled = |label: &str, value: Node| -> Node {
        el("p")
            .child(el("strong").text(label))
            .text(" ")
            .child(value)
            .into()
    };

    let summary = el("div")
        .class("search-summary")
        .child(labeled(
            "Extracted name:",
            text(or_placeholder(Some(result.nombre_extraido.as_str()), NOT_AVAILABLE)),
        ))
        .child(labeled(
            "Extracted CUIT:",
            text(result.cuit().unwrap_or(UNAVAILABLE)),
        ))
        .child(labeled(
            "Match type:",
            el("span")
                .class("badge")
                .class("badge-info")
                .text(or_placeholder(Some(result.match_type.as_str()), NOT_AVAILABLE))
                .into(),
        ));

    let mut container = el("div").class("provider-results").child(summary);
    if result.proveedores.is_empty() {
        container = container.child(el("p").class("empty-state").text("No providers found"));
    }
    container
        .children(result.proveedores.iter().map(provider_card))
        .into()
}

fn provider_card(provider: &Provider) -> Node {
    let meta = format!(
        "Code: {} | CUIT: {} | Score: {}",
        or_placeholder(Some(provider.codigo.as_str()), NOT_AVAILABLE),
        or_placeholder(provider.cuit.as_deref(), NOT_AVAILABLE),
        provider.score
    );

    let mut badges = el("div").class("provider-badges");
    badges = if provider.activo {
        badges.child(el("span").class("badge").class("badge-success").text("Active"))
    } else {
        badges.child(el("span").class("badge").class("badge-warning").text("Inactive"))
    };
    if provider.recomendado {
        badges = badges.child(
            el("span")
                .class("badge")
                .class("badge-recommended")
                .text("Recommended"),
        );
    }

    let header = el("div")
        .class("provider-header")
        .child(
            el("div")
                .class("provider-info")
                .child(el("h4").text(provider.nombre.as_str()))
                .child(el("p").class("provider-meta").text(meta)),
        )
        .child(badges);

    let orders: Node = if provider.ordenes_compra.is_empty() {
        el("p")
            .class("empty-state")
            .text("No active purchase orders")
            .into()
    } else {
        el("div")
            .class("oc-list")
            .child(el("h5").text(format!(
                "Active purchase orders ({}):",
                provider.ordenes_compra.len()
            )))
            .children(provider.ordenes_compra.iter().map(purchase_order_item))
            .into()
    };

    el("div")
        .class("provider-card")
        .class_if(provider.recomendado, "recommended")
        .child(header)
        .child(orders)
        .into()
}

fn purchase_order_item(order: &PurchaseOrderSummary) -> Node {
    let meta = format!(
        "Date: {} | Status: {} | Total: {} | Pending: {} ({} items)",
        or_placeholder(Some(order.fecha.as_str()), NOT_AVAILABLE),
        or_placeholder(Some(order.estado.as_str()), NOT_AVAILABLE),
        format_money(order.monto_total),
        format_money(order.pendiente_total),
        order.items_pendientes
    );

    let mut item = el("div")
        .class("oc-item")
        .class_if(order.recomendado, "recommended")
        .child(
            el("div")
                .class("oc-details")
                .child(el("div").class("oc-number").text(format!("PO {}", order.nro_orden)))
                .child(el("div").class("oc-meta").text(meta)),
        );
    if order.recomendado {
        item = item.child(
            el("span")
                .class("badge")
                .class("badge-recommended")
                .text("Has pending items"),
        );
    }
    item.into()
}

/// Log lines describing a provider search, in display order.
pub fn provider_search_log(result: &ProviderSearchResult) -> Vec<(LogLevel, String)> {
    if !result.success {
        return vec![(
            LogLevel::Warning,
            or_placeholder(result.message.as_deref(), "No provider found").to_string(),
        )];
    }

    let mut lines = vec![
        (
            LogLevel::Success,
            format!(
                "Extracted name: {}",
                or_placeholder(Some(result.nombre_extraido.as_str()), NOT_AVAILABLE)
            ),
        ),
        (
            LogLevel::Success,
            format!("Extracted CUIT: {}", result.cuit().unwrap_or(UNAVAILABLE)),
        ),
        (
            LogLevel::Info,
            format!(
                "Match type: {}",
                or_placeholder(Some(result.match_type.as_str()), NOT_AVAILABLE)
            ),
        ),
        (
            LogLevel::Success,
            format!("Found {} provider(s)", result.proveedores.len()),
        ),
    ];
    lines.extend(result.proveedores.iter().map(|provider| {
        (
            LogLevel::Info,
            format!(
                "{} - {} active PO(s)",
                provider.nombre,
                provider.ordenes_compra.len()
            ),
        )
    }));
    lines
}

pub fn history(entries: &[HistoryEntry]) -> Node {
    if entries.is_empty() {
        return el("p")
            .class("empty-state")
            .text("No processed invoices yet")
            .into();
    }

    el("div")
        .class("history-list")
        .children(entries.iter().map(history_item))
        .into()
}

pub fn history_unavailable() -> Node {
    el("p")
        .class("empty-state")
        .text("Could not load history")
        .into()
}

fn history_item(entry: &HistoryEntry) -> Node {
    let preview = entry.preview.clone().unwrap_or_default();
    let kind = or_placeholder(preview.tipo_comprobante.as_deref(), "Invoice");
    let number = or_placeholder(preview.numero_comprobante.as_deref(), NOT_AVAILABLE);

    let mut info = el("div")
        .class("history-item-info")
        .child(el("h4").text(format!("{kind} {number}")))
        .child(el("p").text(format_timestamp(&entry.timestamp)));
    if let Some(message) = entry.error_message.as_deref().filter(|m| !m.is_empty()) {
        info = info.child(el("p").class("history-error").text(message));
    }

    let (status_class, status_text) = if entry.success {
        ("success", "✓ Success")
    } else {
        ("error", "✗ Error")
    };

    el("div")
        .class("history-item")
        .attr("data-filename", entry.filename.as_str())
        .child(info)
        .child(
            el("div")
                .class("history-item-status")
                .class(status_class)
                .text(status_text),
        )
        .into()
}

fn log_panel(title: &str, panel: &LogPanel) -> Option<Node> {
    if !panel.is_visible() {
        return None;
    }
    let entries = panel.entries().iter().map(|entry| {
        Node::from(
            el("div")
                .class("log-entry")
                .class(format!("log-{}", entry.level.as_str()))
                .child(
                    el("span")
                        .class("log-timestamp")
                        .text(format!("[{}]", entry.time)),
                )
                .text(format!(" {}", entry.message)),
        )
    });
    Some(
        el("div")
            .class("card")
            .class("logs")
            .child(el("h3").text(title))
            .child(el("div").class("logs-container").children(entries))
            .into(),
    )
}

fn result_card(title: &str, body: &Option<Node>) -> Option<Node> {
    body.as_ref().map(|body| {
        el("div")
            .class("card")
            .class("results")
            .child(el("h3").text(title))
            .child(body.clone())
            .into()
    })
}

fn button(id: &'static str, label: &str, enabled: bool) -> Node {
    let button = el("button").attr("id", id).text(label);
    if enabled {
        button.into()
    } else {
        button.attr("disabled", "").into()
    }
}

fn selection_area(upload_visible: bool, prompt: &str, filename: Option<&str>) -> Node {
    if upload_visible {
        return el("div").class("upload-area").text(prompt).into();
    }
    el("div")
        .class("file-item")
        .child(el("span").class("filename").text(filename.unwrap_or_default()))
        .into()
}

fn tab_section(tab: Tab, active: Tab, content: Vec<Node>) -> Node {
    el("section")
        .class("tab-content")
        .class_if(tab == active, "active")
        .attr("id", format!("tab-{}", tab.id()))
        .children(content)
        .into()
}

/// Full document for the current session and screen.
pub fn page(session: &SessionState, screen: &Screen) -> Node {
    let controls = session.controls();

    let status_text = match screen.status {
        ServerStatus::Online => "System online",
        ServerStatus::Offline => "Disconnected",
        ServerStatus::Unknown => "Checking...",
    };
    let header = el("header").child(
        el("div")
            .class("status")
            .child(
                el("span")
                    .class("status-dot")
                    .class_if(screen.status.is_online(), "online"),
            )
            .child(el("span").class("status-text").text(status_text)),
    );

    let tabs = el("nav").class("tabs").children(Tab::ALL.iter().map(|tab| {
        Node::from(
            el("button")
                .class("tab")
                .class_if(*tab == screen.active_tab, "active")
                .attr("data-tab", tab.id())
                .text(tab.title()),
        )
    }));

    let invoice_tab = [
        Some(selection_area(
            controls.invoice_upload_visible,
            "Drop an invoice here (PDF, PNG, JPG, max 16MB)",
            session.filename(FileKind::Invoice),
        )),
        Some(
            el("div")
                .class("actions")
                .child(button(
                    "btnProcessInvoice",
                    "Process invoice",
                    controls.process_enabled,
                ))
                .child(button(
                    "btnExtractOnly",
                    "Extract only",
                    controls.extract_enabled,
                ))
                .child(button(
                    "btnReconcile",
                    "Reconcile",
                    controls.reconcile_enabled,
                ))
                .into(),
        ),
        log_panel("Processing log", &screen.invoice_logs),
        result_card("Results", &screen.invoice_result),
    ];

    let purchase_order_tab = [
        Some(selection_area(
            controls.purchase_order_upload_visible,
            "Drop a purchase order here (PDF, PNG, JPG, max 16MB)",
            session.filename(FileKind::PurchaseOrder),
        )),
        Some(
            el("div")
                .class("actions")
                .child(button(
                    "btnSearchProvider",
                    "Search provider",
                    controls.search_provider_enabled,
                ))
                .into(),
        ),
        log_panel("Search log", &screen.purchase_order_logs),
        result_card("Providers", &screen.provider_result),
    ];

    let history_tab = vec![screen.history.clone().unwrap_or_else(|| {
        el("p")
            .class("empty-state")
            .text("History not loaded")
            .into()
    })];

    let mut body = el("body")
        .child(header)
        .child(tabs)
        .child(tab_section(
            Tab::Invoice,
            screen.active_tab,
            invoice_tab.into_iter().flatten().collect(),
        ))
        .child(tab_section(
            Tab::PurchaseOrder,
            screen.active_tab,
            purchase_order_tab.into_iter().flatten().collect(),
        ))
        .child(tab_section(Tab::History, screen.active_tab, history_tab));

    if let Some(label) = &screen.loading {
        body = body.child(
            el("div")
                .class("loading-overlay")
                .child(el("p").class("loading-text").text(label.as_str())),
        );
    }

    el("html")
        .child(
            el("head")
                .child(el("meta").attr("charset", "utf-8"))
                .child(el("title").text("Invoice desk")),
        )
        .child(body)
        .into()
}

pub fn page_html(session: &SessionState, screen: &Screen) -> String {
    format!("<!DOCTYPE html>\n{}", page(session, screen).to_html())
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
