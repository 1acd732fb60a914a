use serde::{Deserialize, Serialize};

/// Which selection slot a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Invoice,
    PurchaseOrder,
}

impl FileKind {
    /// Multipart field the upload endpoint reads. The backend stores both
    /// kinds under the same field.
    pub fn upload_field(self) -> &'static str {
        match self {
            Self::Invoice | Self::PurchaseOrder => "factura",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::PurchaseOrder => "purchase order",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Invoice,
    PurchaseOrder,
    History,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Invoice, Tab::PurchaseOrder, Tab::History];

    pub fn id(self) -> &'static str {
        match self {
            Self::Invoice => "factura",
            Self::PurchaseOrder => "oc",
            Self::History => "historial",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::PurchaseOrder => "Purchase order",
            Self::History => "History",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl ServerStatus {
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_kinds_upload_under_factura() {
        assert_eq!(FileKind::Invoice.upload_field(), "factura");
        assert_eq!(FileKind::PurchaseOrder.upload_field(), "factura");
    }
}
