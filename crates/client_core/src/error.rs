use std::path::PathBuf;

use shared::error::ApiException;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileRejection {
    #[error("unsupported file type '{mime_type}'; only PDF, PNG and JPG are accepted")]
    UnsupportedType { mime_type: String },
    #[error("file is {size_bytes} bytes, over the {limit} byte limit (16MB)")]
    TooLarge { size_bytes: u64, limit: u64 },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid file: {0}")]
    Rejected(#[from] FileRejection),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Backend(#[from] ApiException),
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn from_reqwest(endpoint: &str, source: reqwest::Error) -> Self {
        if source.is_decode() {
            Self::Decode {
                endpoint: endpoint.to_string(),
                source,
            }
        } else {
            Self::Transport {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }

    /// Status code of a non-2xx backend response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Backend(err) => Some(err.status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_carry_status_and_message() {
        let err = ClientError::from(ApiException::new(404, "Archivo no encontrado"));
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.to_string(),
            "backend responded 404: Archivo no encontrado"
        );
        assert!(!err.is_timeout());
    }

    #[test]
    fn rejection_mentions_limit() {
        let err = ClientError::from(FileRejection::TooLarge {
            size_bytes: 20_000_000,
            limit: 16 * 1024 * 1024,
        });
        assert!(err.to_string().contains("16777216"));
    }
}
