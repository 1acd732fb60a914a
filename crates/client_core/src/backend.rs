//! HTTP contract with the invoice processing service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::FileKind,
    error::{ApiErrorBody, ApiException},
    protocol::{
        ExtractionResult, HistoryEntry, InvoiceFileRequest, ProcessResult,
        ProviderSearchResult, PurchaseOrderFileRequest, ReconcileRequest, ReconciliationResult,
        UploadAck,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    config::{parse_api_base, Settings},
    error::ClientError,
    session::FileCandidate,
};

#[async_trait]
pub trait InvoiceBackend: Send + Sync {
    async fn upload(&self, kind: FileKind, file: &FileCandidate) -> Result<UploadAck, ClientError>;
    async fn process(&self, invoice_filename: &str) -> Result<ProcessResult, ClientError>;
    async fn extract(&self, invoice_filename: &str) -> Result<ExtractionResult, ClientError>;
    async fn reconcile(
        &self,
        invoice_filename: &str,
        nro_oc: Option<&str>,
    ) -> Result<ReconciliationResult, ClientError>;
    async fn search_provider(
        &self,
        purchase_order_filename: &str,
    ) -> Result<ProviderSearchResult, ClientError>;
    async fn history(&self) -> Result<Vec<HistoryEntry>, ClientError>;
    async fn result(&self, filename: &str) -> Result<ProcessResult, ClientError>;
    async fn health(&self) -> Result<(), ClientError>;
}

pub struct HttpBackend {
    http: Client,
    api_base: Url,
    health_timeout: Duration,
}

impl HttpBackend {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        Self::with_timeouts(
            &settings.api_base,
            settings.request_timeout(),
            settings.health_timeout(),
        )
    }

    pub fn with_timeouts(
        api_base: &str,
        request_timeout: Duration,
        health_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let api_base = parse_api_base(api_base)?;
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                endpoint: api_base.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            api_base,
            health_timeout,
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::Config(format!("api_base '{}' cannot be a base", self.api_base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(&[endpoint])?;
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(endpoint, e))?;
        decode(endpoint, response).await
    }

    async fn get_json<T>(&self, endpoint: &str, segments: &[&str]) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(segments)?;
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(endpoint, e))?;
        decode(endpoint, response).await
    }
}

async fn check_status(endpoint: &str, response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let message = ApiErrorBody::message_from(&raw).unwrap_or_else(|| {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{endpoint} failed"))
    });
    Err(ApiException::new(status.as_u16(), message).into())
}

async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, ClientError> {
    check_status(endpoint, response)
        .await?
        .json()
        .await
        .map_err(|e| ClientError::from_reqwest(endpoint, e))
}

#[async_trait]
impl InvoiceBackend for HttpBackend {
    async fn upload(&self, kind: FileKind, file: &FileCandidate) -> Result<UploadAck, ClientError> {
        const ENDPOINT: &str = "upload";
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|source| ClientError::Io {
                path: file.path.clone(),
                source,
            })?;
        let part = Part::bytes(bytes)
            .file_name(file.filename.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| ClientError::from_reqwest(ENDPOINT, e))?;
        let form = Form::new().part(kind.upload_field(), part);

        let response = self
            .http
            .post(self.url(&[ENDPOINT])?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(ENDPOINT, e))?;
        decode(ENDPOINT, response).await
    }

    async fn process(&self, invoice_filename: &str) -> Result<ProcessResult, ClientError> {
        self.post_json(
            "process",
            &InvoiceFileRequest {
                factura_filename: invoice_filename.to_string(),
            },
        )
        .await
    }

    async fn extract(&self, invoice_filename: &str) -> Result<ExtractionResult, ClientError> {
        self.post_json(
            "extract",
            &InvoiceFileRequest {
                factura_filename: invoice_filename.to_string(),
            },
        )
        .await
    }

    async fn reconcile(
        &self,
        invoice_filename: &str,
        nro_oc: Option<&str>,
    ) -> Result<ReconciliationResult, ClientError> {
        self.post_json(
            "reconcile",
            &ReconcileRequest {
                factura_filename: invoice_filename.to_string(),
                nro_oc: nro_oc.map(str::to_string),
            },
        )
        .await
    }

    async fn search_provider(
        &self,
        purchase_order_filename: &str,
    ) -> Result<ProviderSearchResult, ClientError> {
        self.post_json(
            "process_oc_auto",
            &PurchaseOrderFileRequest {
                oc_filename: purchase_order_filename.to_string(),
            },
        )
        .await
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ClientError> {
        self.get_json("history", &["history"]).await
    }

    async fn result(&self, filename: &str) -> Result<ProcessResult, ClientError> {
        self.get_json("result", &["result", filename]).await
    }

    async fn health(&self) -> Result<(), ClientError> {
        const ENDPOINT: &str = "health";
        let response = self
            .http
            .get(self.url(&[ENDPOINT])?)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(ENDPOINT, e))?;
        check_status(ENDPOINT, response).await.map(|_| ())
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
