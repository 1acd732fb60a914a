//! Selected documents and the control flags derived from them.

use std::path::{Path, PathBuf};

use shared::domain::FileKind;

use crate::error::{ClientError, FileRejection};

pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

pub const ACCEPTED_MIME_TYPES: [&str; 4] =
    ["application/pdf", "image/png", "image/jpeg", "image/jpg"];

/// A document the user picked, before or after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl FileCandidate {
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| ClientError::Io {
                path: path.clone(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            path,
            filename,
            mime_type,
            size_bytes: metadata.len(),
        })
    }

    pub fn validate(&self) -> Result<(), FileRejection> {
        validate_file(&self.mime_type, self.size_bytes)
    }
}

pub fn validate_file(mime_type: &str, size_bytes: u64) -> Result<(), FileRejection> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    if !ACCEPTED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(FileRejection::UnsupportedType { mime_type });
    }
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(FileRejection::TooLarge {
            size_bytes,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    invoice: Option<FileCandidate>,
    purchase_order: Option<FileCandidate>,
}

impl SessionState {
    pub fn selected(&self, kind: FileKind) -> Option<&FileCandidate> {
        match kind {
            FileKind::Invoice => self.invoice.as_ref(),
            FileKind::PurchaseOrder => self.purchase_order.as_ref(),
        }
    }

    pub fn filename(&self, kind: FileKind) -> Option<&str> {
        self.selected(kind).map(|file| file.filename.as_str())
    }

    pub fn controls(&self) -> Controls {
        let has_invoice = self.invoice.is_some();
        let has_purchase_order = self.purchase_order.is_some();
        Controls {
            invoice_upload_visible: !has_invoice,
            invoice_file_visible: has_invoice,
            process_enabled: has_invoice,
            extract_enabled: has_invoice,
            reconcile_enabled: has_invoice,
            purchase_order_upload_visible: !has_purchase_order,
            purchase_order_file_visible: has_purchase_order,
            search_provider_enabled: has_purchase_order,
        }
    }

    pub(crate) fn set(&mut self, kind: FileKind, file: FileCandidate) {
        *self.slot(kind) = Some(file);
    }

    pub(crate) fn clear(&mut self, kind: FileKind) -> Option<FileCandidate> {
        self.slot(kind).take()
    }

    fn slot(&mut self, kind: FileKind) -> &mut Option<FileCandidate> {
        match kind {
            FileKind::Invoice => &mut self.invoice,
            FileKind::PurchaseOrder => &mut self.purchase_order,
        }
    }
}

/// Visibility of the selection areas and enablement of the action buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub invoice_upload_visible: bool,
    pub invoice_file_visible: bool,
    pub process_enabled: bool,
    pub extract_enabled: bool,
    pub reconcile_enabled: bool,
    pub purchase_order_upload_visible: bool,
    pub purchase_order_file_visible: bool,
    pub search_provider_enabled: bool,
}

impl Default for Controls {
    fn default() -> Self {
        SessionState::default().controls()
    }
}
