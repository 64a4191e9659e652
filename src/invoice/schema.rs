//! The two supported invoice payload schemas, told apart structurally.
//!
//! There is no version tag or discriminator field on the wire. A payload is
//! the **orchestrator schema** exactly when it has an array-valued `Items`
//! field *and* an object-valued `Receiver`; anything else — including
//! payloads missing both signals — is the **legacy schema** (flat,
//! Spanish snake_case field names, a `cliente` string instead of a
//! `Receiver` object) and parses with every field optional.
//!
//! The detection predicate runs once at the boundary and the result is a
//! tagged union; nothing downstream re-checks field presence to guess the
//! shape.

use crate::error::ProcessError;
use serde::Deserialize;
use serde_json::Value;

/// An invoice payload after boundary detection.
#[derive(Debug)]
pub enum InvoicePayload {
    Orchestrator(OrchestratorInvoice),
    Legacy(LegacyInvoice),
}

impl InvoicePayload {
    /// Detect the schema and parse the payload into its variant.
    ///
    /// Legacy parsing is permissive — unknown payloads become a legacy
    /// invoice full of `None`s and fail later in validation, not here.
    pub fn from_value(value: Value) -> Result<Self, ProcessError> {
        if is_orchestrator(&value) {
            let parsed = serde_json::from_value(value)
                .map_err(|e| ProcessError::Validation(format!("malformed invoice payload: {e}")))?;
            Ok(InvoicePayload::Orchestrator(parsed))
        } else {
            let parsed = serde_json::from_value(value)
                .map_err(|e| ProcessError::Validation(format!("malformed invoice payload: {e}")))?;
            Ok(InvoicePayload::Legacy(parsed))
        }
    }
}

/// The exact structural predicate: array `Items` AND object `Receiver`.
fn is_orchestrator(value: &Value) -> bool {
    value.get("Items").map(Value::is_array).unwrap_or(false)
        && value.get("Receiver").map(Value::is_object).unwrap_or(false)
}

// ── Orchestrator schema (PascalCase, nested blocks) ──────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrchestratorInvoice {
    pub folio: Option<String>,
    pub date: Option<String>,
    pub cfdi_type: Option<String>,
    pub expedition_place: Option<String>,
    pub payment_form: Option<String>,
    pub payment_method: Option<String>,
    pub emisor: Option<OrchestratorIssuer>,
    pub receiver: Option<OrchestratorReceiver>,
    #[serde(default)]
    pub items: Vec<OrchestratorItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrchestratorIssuer {
    pub name: Option<String>,
    pub rfc: Option<String>,
    pub address: Option<String>,
    pub fiscal_regime: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrchestratorReceiver {
    pub name: Option<String>,
    pub rfc: Option<String>,
    pub cfdi_use: Option<String>,
    pub fiscal_regime: Option<String>,
    pub tax_zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrchestratorItem {
    pub product_code: Option<String>,
    pub unit_code: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub subtotal: Option<f64>,
    pub total: Option<f64>,
    pub description: Option<String>,
    #[serde(default)]
    pub taxes: Vec<OrchestratorTax>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrchestratorTax {
    pub name: Option<String>,
    pub rate: Option<f64>,
    pub is_retention: Option<bool>,
    pub is_federal: Option<bool>,
    pub total: Option<f64>,
}

// ── Legacy schema (flat, Spanish snake_case) ─────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LegacyInvoice {
    pub cliente: Option<String>,
    pub rfc: Option<String>,
    pub folio: Option<String>,
    pub fecha: Option<String>,
    pub lugar_expedicion: Option<String>,
    pub forma_pago: Option<String>,
    pub metodo_pago: Option<String>,
    #[serde(default)]
    pub conceptos: Vec<LegacyItem>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyItem {
    pub clave_prodserv: Option<String>,
    pub clave_unidad: Option<String>,
    pub cantidad: Option<f64>,
    pub precio_unitario: Option<f64>,
    /// Line subtotal.
    pub importe: Option<f64>,
    /// Explicit line total, when the caller pre-computed it.
    pub total: Option<f64>,
    pub descripcion: Option<String>,
    /// Explicit VAT amount for the line.
    pub iva: Option<f64>,
    /// Retained amount (subtracted, never added to VAT).
    pub retencion: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn items_plus_receiver_object_is_orchestrator() {
        let v = json!({
            "Receiver": { "Name": "ACME" },
            "Items": [{ "Quantity": 1, "UnitPrice": 100.0 }],
        });
        assert!(matches!(
            InvoicePayload::from_value(v).unwrap(),
            InvoicePayload::Orchestrator(_)
        ));
    }

    #[test]
    fn receiver_string_is_not_orchestrator() {
        // `Receiver` must be an object; a string fails the predicate.
        let v = json!({ "Receiver": "ACME", "Items": [] });
        assert!(matches!(
            InvoicePayload::from_value(v).unwrap(),
            InvoicePayload::Legacy(_)
        ));
    }

    #[test]
    fn items_without_receiver_is_legacy() {
        let v = json!({ "Items": [{ "Quantity": 1 }] });
        assert!(matches!(
            InvoicePayload::from_value(v).unwrap(),
            InvoicePayload::Legacy(_)
        ));
    }

    #[test]
    fn flat_spanish_payload_is_legacy() {
        let v = json!({
            "cliente": "Juan Pérez",
            "conceptos": [{ "cantidad": 2.0, "precio_unitario": 50.0 }],
        });
        match InvoicePayload::from_value(v).unwrap() {
            InvoicePayload::Legacy(l) => {
                assert_eq!(l.cliente.as_deref(), Some("Juan Pérez"));
                assert_eq!(l.conceptos.len(), 1);
            }
            other => panic!("expected legacy, got {other:?}"),
        }
    }

    #[test]
    fn empty_payload_falls_through_to_legacy() {
        assert!(matches!(
            InvoicePayload::from_value(json!({})).unwrap(),
            InvoicePayload::Legacy(_)
        ));
    }
}
