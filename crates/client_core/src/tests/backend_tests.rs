use super::*;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone)]
struct UploadedPart {
    field: String,
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

#[derive(Clone, Default)]
struct ServerState {
    uploads: Arc<Mutex<Vec<UploadedPart>>>,
    bodies: Arc<Mutex<Vec<(&'static str, Value)>>>,
    healthy: Arc<AtomicBool>,
    history_broken: Arc<AtomicBool>,
}

impl ServerState {
    async fn record(&self, endpoint: &'static str, body: Value) {
        self.bodies.lock().await.push((endpoint, body));
    }
}

async fn upload(State(state): State<ServerState>, mut multipart: Multipart) -> Json<Value> {
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap_or_default().to_vec();
        state.uploads.lock().await.push(UploadedPart {
            field: field_name,
            file_name,
            content_type,
            bytes,
        });
    }
    Json(json!({ "message": "Archivo subido", "factura": "20240115_103045_fa.pdf" }))
}

async fn process(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
    state.record("process", body).await;
    Json(json!({
        "success": false,
        "extraction": { "cabecera": { "proveedor": { "nombre": "ACME SA" } } },
        "reconciliation": null,
        "database": { "message": "Guardado" },
        "errors": ["Missing CUIT", "Amount mismatch"]
    }))
}

async fn extract(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.record("extract", body.clone()).await;
    if body["factura_filename"] == "missing.pdf" {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Archivo no encontrado" })),
        ));
    }
    Ok(Json(json!({ "data": { "total": 1210.0 } })))
}

async fn reconcile(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
    state.record("reconcile", body).await;
    Json(json!({ "success": true, "data": { "coincide": true } }))
}

async fn process_oc_auto(State(state): State<ServerState>, Json(body): Json<Value>) -> Json<Value> {
    state.record("process_oc_auto", body).await;
    Json(json!({
        "success": true,
        "nombre_extraido": "ACME SA",
        "cuit_extraido": "",
        "match_type": "NOMBRE_SIMILAR",
        "proveedores": [{
            "nombre": "ACME SOCIEDAD ANONIMA",
            "codigo": 4512,
            "cuit": null,
            "score": 92,
            "activo": true,
            "recomendado": true,
            "ordenes_compra": [{
                "nro_orden": 77,
                "fecha": "2024-01-10",
                "estado": "ABIERTA",
                "monto_total": 1500,
                "pendiente_total": 250.5,
                "items_pendientes": 2,
                "recomendado": true
            }]
        }]
    }))
}

async fn history(State(state): State<ServerState>) -> Response {
    if state.history_broken.load(Ordering::SeqCst) {
        return (StatusCode::BAD_GATEWAY, "upstream down").into_response();
    }
    Json(json!([{
        "filename": "result_20240115_103045.json",
        "timestamp": "20240115_103045",
        "success": true,
        "preview": { "numero_comprobante": 42, "tipo_comprobante": "Factura A" },
        "has_errors": false
    }]))
    .into_response()
}

async fn stored_result(Path(filename): Path<String>) -> Response {
    if filename != "result_20240115_103045.json" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Resultado no encontrado" })),
        )
            .into_response();
    }
    Json(json!({ "success": true, "errors": [] })).into_response()
}

async fn health(State(state): State<ServerState>) -> Response {
    if state.healthy.load(Ordering::SeqCst) {
        Json(json!({ "status": "ok", "timestamp": "2024-01-15T10:30:45" })).into_response()
    } else {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

async fn slow_process() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "success": true }))
}

async fn spawn_backend_server() -> std::io::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    state.healthy.store(true, Ordering::SeqCst);
    let app = Router::new()
        .route("/api/upload", post(upload))
        .route("/api/process", post(process))
        .route("/api/extract", post(extract))
        .route("/api/reconcile", post(reconcile))
        .route("/api/process_oc_auto", post(process_oc_auto))
        .route("/api/history", get(history))
        .route("/api/result/:filename", get(stored_result))
        .route("/api/health", get(health))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

fn backend_for(api_base: &str) -> HttpBackend {
    HttpBackend::with_timeouts(api_base, Duration::from_secs(10), Duration::from_secs(2))
        .expect("backend")
}

fn temp_upload(name: &str, contents: &[u8]) -> FileCandidate {
    let path: PathBuf = std::env::temp_dir().join(format!(
        "invoice-desk-{}-{name}",
        std::process::id()
    ));
    std::fs::write(&path, contents).expect("write temp file");
    FileCandidate {
        path,
        filename: name.to_string(),
        mime_type: "application/pdf".to_string(),
        size_bytes: contents.len() as u64,
    }
}

#[tokio::test]
async fn upload_sends_multipart_factura_field() {
    let (api_base, state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend_for(&api_base);

    for kind in [FileKind::Invoice, FileKind::PurchaseOrder] {
        let file = temp_upload(&format!("{}.pdf", kind.label()), b"%PDF-1.4 test");
        let ack = backend.upload(kind, &file).await.expect("upload");
        assert_eq!(ack.factura.as_deref(), Some("20240115_103045_fa.pdf"));
        let _ = std::fs::remove_file(&file.path);
    }

    let uploads = state.uploads.lock().await.clone();
    assert_eq!(uploads.len(), 2);
    for part in &uploads {
        assert_eq!(part.field, "factura");
        assert_eq!(part.content_type, "application/pdf");
        assert_eq!(part.bytes, b"%PDF-1.4 test");
    }
    assert!(uploads[0].file_name.ends_with(".pdf"));
}

#[tokio::test]
async fn upload_of_missing_file_fails_before_any_request() {
    let (api_base, state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend_for(&api_base);
    let file = FileCandidate {
        path: PathBuf::from("/nonexistent/invoice-desk/fa.pdf"),
        filename: "fa.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        size_bytes: 10,
    };

    let err = backend
        .upload(FileKind::Invoice, &file)
        .await
        .expect_err("missing file");

    assert!(matches!(err, ClientError::Io { .. }));
    assert!(state.uploads.lock().await.is_empty());
}

#[tokio::test]
async fn json_operations_post_expected_bodies() {
    let (api_base, state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend_for(&api_base);

    let processed = backend.process("fa.pdf").await.expect("process");
    assert!(!processed.success);
    assert_eq!(processed.errors, vec!["Missing CUIT", "Amount mismatch"]);
    assert!(processed.reconciliation.is_none());
    assert_eq!(
        processed.database.and_then(|db| db.message).as_deref(),
        Some("Guardado")
    );

    let extracted = backend.extract("fa.pdf").await.expect("extract");
    assert_eq!(extracted.data["total"], json!(1210.0));

    backend.reconcile("fa.pdf", None).await.expect("reconcile");
    backend
        .reconcile("fa.pdf", Some("0001-77"))
        .await
        .expect("reconcile");

    let providers = backend.search_provider("oc.pdf").await.expect("search");
    assert!(providers.cuit().is_none());
    assert_eq!(providers.proveedores[0].codigo, "4512");
    assert_eq!(providers.proveedores[0].ordenes_compra[0].nro_orden, "77");

    let bodies = state.bodies.lock().await.clone();
    assert_eq!(
        bodies,
        vec![
            ("process", json!({ "factura_filename": "fa.pdf" })),
            ("extract", json!({ "factura_filename": "fa.pdf" })),
            ("reconcile", json!({ "factura_filename": "fa.pdf" })),
            (
                "reconcile",
                json!({ "factura_filename": "fa.pdf", "nro_oc": "0001-77" })
            ),
            ("process_oc_auto", json!({ "oc_filename": "oc.pdf" })),
        ]
    );
}

#[tokio::test]
async fn error_body_message_is_surfaced() {
    let (api_base, _state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend_for(&api_base);

    let err = backend.extract("missing.pdf").await.expect_err("not found");

    assert_eq!(err.status(), Some(404));
    match err {
        ClientError::Backend(api) => assert_eq!(api.message, "Archivo no encontrado"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_falls_back_to_status_reason() {
    let (api_base, state) = spawn_backend_server().await.expect("spawn server");
    state.history_broken.store(true, Ordering::SeqCst);
    let backend = backend_for(&api_base);

    let err = backend.history().await.expect_err("bad gateway");

    match err {
        ClientError::Backend(api) => {
            assert_eq!(api.status, 502);
            assert_eq!(api.message, "Bad Gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn history_and_stored_results_are_fetched_by_path() {
    let (api_base, _state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend_for(&api_base);

    let entries = backend.history().await.expect("history");
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0]
            .preview
            .as_ref()
            .and_then(|p| p.numero_comprobante.as_deref()),
        Some("42")
    );
    assert!(entries[0].error_message.is_none());

    let stored = backend
        .result("result_20240115_103045.json")
        .await
        .expect("stored result");
    assert!(stored.success);

    let missing = backend
        .result("result_missing.json")
        .await
        .expect_err("missing");
    assert_eq!(missing.status(), Some(404));
}

#[tokio::test]
async fn health_reports_unhealthy_and_unreachable_backends() {
    let (api_base, state) = spawn_backend_server().await.expect("spawn server");
    let backend = backend_for(&api_base);
    backend.health().await.expect("healthy");

    state.healthy.store(false, Ordering::SeqCst);
    let err = backend.health().await.expect_err("unhealthy");
    assert_eq!(err.status(), Some(500));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let unreachable = backend_for(&format!("http://{addr}/api"));
    let err = unreachable.health().await.expect_err("unreachable");
    assert!(matches!(err, ClientError::Transport { .. }));
}

#[tokio::test]
async fn slow_backend_times_out() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route("/api/process", post(slow_process));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let backend = HttpBackend::with_timeouts(
        &format!("http://{addr}/api"),
        Duration::from_millis(200),
        Duration::from_millis(200),
    )
    .expect("backend");

    let err = backend.process("fa.pdf").await.expect_err("timeout");
    assert!(err.is_timeout());
}

#[tokio::test]
async fn health_accepts_any_success_body() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route("/api/health", get(|| async { "OK" }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    backend_for(&format!("http://{addr}/api"))
        .health()
        .await
        .expect("plain-text health body");
}

#[test]
fn rejects_non_http_base() {
    let err = HttpBackend::with_timeouts(
        "ftp://localhost/api",
        Duration::from_secs(1),
        Duration::from_secs(1),
    )
    .err()
    .expect("rejected");
    assert!(matches!(err, ClientError::Config(_)));
}

#[test]
fn urls_keep_api_prefix() {
    let backend = backend_for("http://localhost:5000/api/");
    assert_eq!(
        backend.url(&["result", "a b.json"]).expect("url").as_str(),
        "http://localhost:5000/api/result/a%20b.json"
    );
}
