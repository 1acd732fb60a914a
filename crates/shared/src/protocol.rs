use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Treats an explicit JSON `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Database codes come back as numbers or strings depending on the column.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string_or_number(deserializer)?.unwrap_or_default())
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvoiceFileRequest {
    pub factura_filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub factura_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nro_oc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PurchaseOrderFileRequest {
    pub oc_filename: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factura: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessResult {
    #[serde(default, deserialize_with = "nullable")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseOutcome>,
    #[serde(default, deserialize_with = "nullable")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationResult {
    #[serde(default, deserialize_with = "nullable")]
    pub success: bool,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseOrderSummary {
    #[serde(default, deserialize_with = "string_or_number")]
    pub nro_orden: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub fecha: String,
    #[serde(default, deserialize_with = "nullable")]
    pub estado: String,
    #[serde(default, deserialize_with = "nullable")]
    pub monto_total: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub pendiente_total: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub items_pendientes: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub recomendado: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default, deserialize_with = "nullable")]
    pub nombre: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub codigo: String,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub cuit: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub score: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub activo: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub recomendado: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub ordenes_compra: Vec<PurchaseOrderSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSearchResult {
    #[serde(default, deserialize_with = "nullable")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub nombre_extraido: String,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub cuit_extraido: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub match_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub proveedores: Vec<Provider>,
}

impl ProviderSearchResult {
    /// Extracted tax id, treating an empty string as absent.
    pub fn cuit(&self) -> Option<&str> {
        self.cuit_extraido
            .as_deref()
            .map(str::trim)
            .filter(|cuit| !cuit.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryPreview {
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub numero_comprobante: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_comprobante: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub filename: String,
    #[serde(default, deserialize_with = "nullable")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "nullable")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<HistoryPreview>,
    #[serde(default, deserialize_with = "nullable")]
    pub has_errors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_codes_accept_numbers_and_strings() {
        let provider: Provider = serde_json::from_str(
            r#"{"nombre":"ACME SA","codigo":4512,"cuit":30712345678,"score":87.5,
                "activo":true,"ordenes_compra":[{"nro_orden":"0001-77","fecha":"2024-01-10",
                "estado":"ABIERTA","monto_total":1500,"pendiente_total":250.5,
                "items_pendientes":3,"recomendado":true}]}"#,
        )
        .expect("provider");

        assert_eq!(provider.codigo, "4512");
        assert_eq!(provider.cuit.as_deref(), Some("30712345678"));
        assert!(!provider.recomendado);
        assert_eq!(provider.ordenes_compra[0].nro_orden, "0001-77");
        assert_eq!(provider.ordenes_compra[0].items_pendientes, 3);
    }

    #[test]
    fn failed_provider_search_omits_match_type() {
        let result: ProviderSearchResult = serde_json::from_str(
            r#"{"success":false,"message":"No matching provider",
                "nombre_extraido":"ACME","cuit_extraido":"","proveedores":[]}"#,
        )
        .expect("search result");

        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("No matching provider"));
        assert!(result.match_type.is_empty());
        assert!(result.cuit().is_none());
    }

    #[test]
    fn process_result_tolerates_null_fields() {
        let result: ProcessResult = serde_json::from_str(
            r#"{"success":true,"extraction":null,"errors":null,"database":{"message":null}}"#,
        )
        .expect("process result");

        assert!(result.success);
        assert!(result.extraction.is_none());
        assert!(result.errors.is_empty());
        assert!(result.database.and_then(|db| db.message).is_none());
    }

    #[test]
    fn reconcile_request_skips_missing_order_number() {
        let body = serde_json::to_value(ReconcileRequest {
            factura_filename: "fa-001.pdf".to_string(),
            nro_oc: None,
        })
        .expect("serialize");
        assert_eq!(body, serde_json::json!({ "factura_filename": "fa-001.pdf" }));
    }
}
