use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body the backend returns alongside non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

impl ApiErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Extracts the `error` message from a raw response body, if it has one.
    pub fn message_from(raw: &str) -> Option<String> {
        serde_json::from_str::<ApiErrorBody>(raw)
            .ok()
            .map(|body| body.error)
            .filter(|message| !message.trim().is_empty())
    }
}

#[derive(Debug, Error)]
#[error("backend responded {status}: {message}")]
pub struct ApiException {
    pub status: u16,
    pub message: String,
}

impl ApiException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_error_message_from_backend_body() {
        assert_eq!(
            ApiErrorBody::message_from(r#"{"error":"Archivo no encontrado"}"#).as_deref(),
            Some("Archivo no encontrado")
        );
    }

    #[test]
    fn ignores_bodies_without_error_field() {
        assert!(ApiErrorBody::message_from("<html>bad gateway</html>").is_none());
        assert!(ApiErrorBody::message_from(r#"{"error":"  "}"#).is_none());
    }
}
