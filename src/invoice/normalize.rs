//! Invoice normalizer: either payload schema → [`CanonicalInvoice`].
//!
//! Field names differ per schema but both map into the same canonical line
//! shape; every absent field has a named default supplied by the injected
//! [`ServiceConfig`] (issuer identity, generic public consumer receiver,
//! SAT generic product/unit codes, document metadata). Defaults come from
//! configuration at construction, never from the environment at call time,
//! so they are testable and overridable.
//!
//! Validation is fail-closed and minimal: a payload with no receiver
//! name/`cliente` or no items never reaches the renderer.

use crate::config::ServiceConfig;
use crate::error::ProcessError;
use crate::invoice::model::{
    CanonicalInvoice, DocumentMeta, IssuerBlock, LineItem, ReceiverBlock, TaxEntry,
};
use crate::invoice::schema::{InvoicePayload, LegacyInvoice, OrchestratorInvoice};
use crate::invoice::totals::compute_totals;
use chrono::Utc;

/// Converts detected payloads into canonical invoices.
pub struct Normalizer<'a> {
    config: &'a ServiceConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a ServiceConfig) -> Self {
        Self { config }
    }

    /// Normalize a detected payload. Deterministic: the same input yields
    /// an identical canonical invoice (dates only default when absent).
    pub fn normalize(&self, payload: &InvoicePayload) -> Result<CanonicalInvoice, ProcessError> {
        match payload {
            InvoicePayload::Orchestrator(inv) => self.from_orchestrator(inv),
            InvoicePayload::Legacy(inv) => self.from_legacy(inv),
        }
    }

    fn from_orchestrator(
        &self,
        inv: &OrchestratorInvoice,
    ) -> Result<CanonicalInvoice, ProcessError> {
        let receiver_name = inv
            .receiver
            .as_ref()
            .and_then(|r| r.name.as_deref())
            .filter(|n| !n.trim().is_empty());
        self.validate(receiver_name, inv.items.len())?;

        let d = &self.config.document;
        let items: Vec<LineItem> = inv
            .items
            .iter()
            .map(|it| {
                let quantity = it.quantity.unwrap_or(1.0);
                let unit_price = it.unit_price.unwrap_or(0.0);
                let line_subtotal = it.subtotal.unwrap_or(quantity * unit_price);
                LineItem {
                    product_code: it
                        .product_code
                        .clone()
                        .unwrap_or_else(|| d.product_code.clone()),
                    quantity,
                    unit_code: it.unit_code.clone().unwrap_or_else(|| d.unit_code.clone()),
                    description: it.description.clone().unwrap_or_else(|| "N/A".to_string()),
                    unit_price,
                    line_subtotal,
                    line_total: it.total.unwrap_or(0.0),
                    taxes: it
                        .taxes
                        .iter()
                        .map(|t| TaxEntry {
                            name: t.name.clone().unwrap_or_else(|| "IVA".to_string()),
                            rate: t.rate.unwrap_or(0.0),
                            is_retention: t.is_retention.unwrap_or(false),
                            is_federal: t.is_federal.unwrap_or(true),
                            total: t.total.unwrap_or(0.0),
                        })
                        .collect(),
                }
            })
            .collect();

        let receiver = inv.receiver.as_ref();
        let r = &self.config.receiver;
        Ok(self.assemble(
            IssuerBlock {
                name: inv
                    .emisor
                    .as_ref()
                    .and_then(|e| e.name.clone())
                    .or_else(|| self.config.issuer.name.clone())
                    .unwrap_or_else(|| "N/A".to_string()),
                rfc: inv
                    .emisor
                    .as_ref()
                    .and_then(|e| e.rfc.clone())
                    .or_else(|| self.config.issuer.rfc.clone())
                    .unwrap_or_else(|| "N/A".to_string()),
                address: inv
                    .emisor
                    .as_ref()
                    .and_then(|e| e.address.clone())
                    .or_else(|| self.config.issuer.address.clone())
                    .unwrap_or_default(),
                fiscal_regime: inv
                    .emisor
                    .as_ref()
                    .and_then(|e| e.fiscal_regime.clone())
                    .or_else(|| self.config.issuer.fiscal_regime.clone())
                    .unwrap_or_else(|| "N/A".to_string()),
            },
            ReceiverBlock {
                name: receiver
                    .and_then(|x| x.name.clone())
                    .unwrap_or_else(|| r.name.clone()),
                rfc: receiver
                    .and_then(|x| x.rfc.clone())
                    .unwrap_or_else(|| r.rfc.clone()),
                cfdi_use: receiver
                    .and_then(|x| x.cfdi_use.clone())
                    .unwrap_or_else(|| r.cfdi_use.clone()),
                fiscal_regime: receiver
                    .and_then(|x| x.fiscal_regime.clone())
                    .unwrap_or_else(|| r.fiscal_regime.clone()),
                tax_zip_code: receiver
                    .and_then(|x| x.tax_zip_code.clone())
                    .unwrap_or_else(|| r.tax_zip_code.clone()),
            },
            inv.folio.clone(),
            inv.date.clone(),
            inv.cfdi_type.clone(),
            inv.expedition_place.clone(),
            inv.payment_form.clone(),
            inv.payment_method.clone(),
            items,
        ))
    }

    fn from_legacy(&self, inv: &LegacyInvoice) -> Result<CanonicalInvoice, ProcessError> {
        let cliente = inv.cliente.as_deref().filter(|n| !n.trim().is_empty());
        self.validate(cliente, inv.conceptos.len())?;

        let d = &self.config.document;
        let items: Vec<LineItem> = inv
            .conceptos
            .iter()
            .map(|it| {
                let quantity = it.cantidad.unwrap_or(1.0);
                let unit_price = it.precio_unitario.unwrap_or(0.0);
                let line_subtotal = it.importe.unwrap_or(quantity * unit_price);
                let mut taxes = Vec::new();
                if let Some(iva) = it.iva {
                    taxes.push(TaxEntry {
                        name: "IVA".to_string(),
                        rate: self.config.vat_rate,
                        is_retention: false,
                        is_federal: true,
                        total: iva,
                    });
                }
                if let Some(ret) = it.retencion {
                    taxes.push(TaxEntry {
                        name: "IVA".to_string(),
                        rate: 0.0,
                        is_retention: true,
                        is_federal: true,
                        total: ret,
                    });
                }
                LineItem {
                    product_code: it
                        .clave_prodserv
                        .clone()
                        .unwrap_or_else(|| d.product_code.clone()),
                    quantity,
                    unit_code: it
                        .clave_unidad
                        .clone()
                        .unwrap_or_else(|| d.unit_code.clone()),
                    description: it.descripcion.clone().unwrap_or_else(|| "N/A".to_string()),
                    unit_price,
                    line_subtotal,
                    line_total: it.total.unwrap_or(0.0),
                    taxes,
                }
            })
            .collect();

        let r = &self.config.receiver;
        Ok(self.assemble(
            IssuerBlock {
                name: self
                    .config
                    .issuer
                    .name
                    .clone()
                    .unwrap_or_else(|| "N/A".to_string()),
                rfc: self
                    .config
                    .issuer
                    .rfc
                    .clone()
                    .unwrap_or_else(|| "N/A".to_string()),
                address: self.config.issuer.address.clone().unwrap_or_default(),
                fiscal_regime: self
                    .config
                    .issuer
                    .fiscal_regime
                    .clone()
                    .unwrap_or_else(|| "N/A".to_string()),
            },
            ReceiverBlock {
                name: cliente.map(str::to_string).unwrap_or_else(|| r.name.clone()),
                rfc: inv.rfc.clone().unwrap_or_else(|| r.rfc.clone()),
                cfdi_use: r.cfdi_use.clone(),
                fiscal_regime: r.fiscal_regime.clone(),
                tax_zip_code: r.tax_zip_code.clone(),
            },
            inv.folio.clone(),
            inv.fecha.clone(),
            None,
            inv.lugar_expedicion.clone(),
            inv.forma_pago.clone(),
            inv.metodo_pago.clone(),
            items,
        ))
    }

    /// Fail-closed gate: no partial invoice is ever rendered.
    fn validate(&self, receiver_name: Option<&str>, item_count: usize) -> Result<(), ProcessError> {
        if receiver_name.is_none() {
            return Err(ProcessError::Validation(
                "missing receiver name (`Receiver.Name` / `cliente`)".into(),
            ));
        }
        if item_count == 0 {
            return Err(ProcessError::Validation("invoice has no items".into()));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        issuer: IssuerBlock,
        receiver: ReceiverBlock,
        folio: Option<String>,
        date: Option<String>,
        cfdi_type: Option<String>,
        expedition_place: Option<String>,
        payment_form: Option<String>,
        payment_method: Option<String>,
        items: Vec<LineItem>,
    ) -> CanonicalInvoice {
        let d = &self.config.document;
        let cfdi_type = cfdi_type
            .unwrap_or_else(|| d.cfdi_type.clone())
            .to_uppercase();
        let cfdi_effect = if cfdi_type == "I" {
            "I - Ingreso".to_string()
        } else {
            cfdi_type
        };
        let totals = compute_totals(&items, self.config.vat_rate);
        CanonicalInvoice {
            issuer,
            receiver,
            meta: DocumentMeta {
                folio: folio.unwrap_or_else(|| d.folio.clone()),
                date: date.unwrap_or_else(|| Utc::now().date_naive().to_string()),
                expedition_place: expedition_place
                    .unwrap_or_else(|| d.expedition_place.clone()),
                cfdi_effect,
                payment_form: payment_form.unwrap_or_else(|| d.payment_form.clone()),
                payment_method: payment_method.unwrap_or_else(|| d.payment_method.clone()),
            },
            items,
            totals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ServiceConfig {
        ServiceConfig::default()
    }

    fn normalize(value: serde_json::Value) -> Result<CanonicalInvoice, ProcessError> {
        let payload = InvoicePayload::from_value(value)?;
        let config = config();
        Normalizer::new(&config).normalize(&payload)
    }

    #[test]
    fn orchestrator_item_with_explicit_iva() {
        let inv = normalize(json!({
            "Receiver": { "Name": "ACME SA DE CV", "Rfc": "AAA010101AAA" },
            "Items": [{
                "Quantity": 1.0,
                "UnitPrice": 100.0,
                "Subtotal": 100.0,
                "Taxes": [{ "Name": "IVA", "Total": 16.0, "IsRetention": false }],
            }],
        }))
        .unwrap();
        assert_eq!(inv.totals.subtotal, 100.0);
        assert_eq!(inv.totals.tax, 16.0);
        assert_eq!(inv.totals.total, 116.0);
        assert_eq!(inv.receiver.name, "ACME SA DE CV");
    }

    #[test]
    fn legacy_item_without_totals_uses_the_fallback() {
        let inv = normalize(json!({
            "cliente": "Juan Pérez",
            "conceptos": [{ "cantidad": 2.0, "precio_unitario": 50.0 }],
        }))
        .unwrap();
        assert_eq!(inv.totals.subtotal, 100.0);
        assert_eq!(inv.totals.tax, 16.0);
        assert_eq!(inv.totals.total, 116.0);
    }

    #[test]
    fn defaults_fill_every_absent_field() {
        let inv = normalize(json!({
            "cliente": "Juan Pérez",
            "conceptos": [{ "cantidad": 1.0, "precio_unitario": 10.0 }],
        }))
        .unwrap();
        assert_eq!(inv.receiver.rfc, "XAXX010101000");
        assert_eq!(inv.receiver.cfdi_use, "S01");
        assert_eq!(inv.receiver.fiscal_regime, "616");
        assert_eq!(inv.meta.folio, "S/N");
        assert_eq!(inv.meta.cfdi_effect, "I - Ingreso");
        assert_eq!(inv.meta.payment_method, "PUE");
        assert_eq!(inv.items[0].product_code, "01010101");
        assert_eq!(inv.items[0].unit_code, "H87");
    }

    #[test]
    fn non_income_cfdi_type_is_not_expanded() {
        let inv = normalize(json!({
            "CfdiType": "e",
            "Receiver": { "Name": "ACME" },
            "Items": [{ "Quantity": 1.0, "UnitPrice": 5.0 }],
        }))
        .unwrap();
        assert_eq!(inv.meta.cfdi_effect, "E");
    }

    #[test]
    fn missing_receiver_name_is_a_validation_error() {
        let err = normalize(json!({
            "Receiver": { "Rfc": "AAA010101AAA" },
            "Items": [{ "Quantity": 1.0 }],
        }))
        .unwrap_err();
        assert!(matches!(err, ProcessError::Validation(_)));
    }

    #[test]
    fn empty_items_are_a_validation_error() {
        let err = normalize(json!({ "cliente": "Juan", "conceptos": [] })).unwrap_err();
        assert!(matches!(err, ProcessError::Validation(_)));
    }

    #[test]
    fn normalization_is_deterministic() {
        let value = json!({
            "cliente": "Juan Pérez",
            "fecha": "2026-01-11",
            "conceptos": [
                { "cantidad": 2.0, "precio_unitario": 50.0, "iva": 16.0 },
                { "descripcion": "Envío", "cantidad": 1.0, "precio_unitario": 99.5 },
            ],
        });
        let a = normalize(value.clone()).unwrap();
        let b = normalize(value).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn legacy_retention_is_marked_as_such() {
        let inv = normalize(json!({
            "cliente": "Juan",
            "conceptos": [{
                "cantidad": 1.0,
                "precio_unitario": 100.0,
                "iva": 16.0,
                "retencion": 10.67,
            }],
        }))
        .unwrap();
        let taxes = &inv.items[0].taxes;
        assert_eq!(taxes.len(), 2);
        assert!(!taxes[0].is_retention);
        assert!(taxes[1].is_retention);
        // Retention excluded: VAT stays at the explicit 16.
        assert_eq!(inv.totals.tax, 16.0);
    }
}
