//! Canonical invoice model.
//!
//! Both supported payload schemas are converted into this single
//! representation before totals computation and rendering. Built once per
//! request, never mutated after construction, consumed immediately by the
//! totals engine and the renderer.

use serde::Serialize;

/// The unified in-memory invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalInvoice {
    pub issuer: IssuerBlock,
    pub receiver: ReceiverBlock,
    pub meta: DocumentMeta,
    pub items: Vec<LineItem>,
    pub totals: Totals,
}

/// Issuer identity stamped on the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuerBlock {
    pub name: String,
    pub rfc: String,
    pub address: String,
    pub fiscal_regime: String,
}

/// Receiver identity and fiscal codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiverBlock {
    pub name: String,
    pub rfc: String,
    pub cfdi_use: String,
    pub fiscal_regime: String,
    pub tax_zip_code: String,
}

/// Document-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMeta {
    pub folio: String,
    /// ISO date (`YYYY-MM-DD`).
    pub date: String,
    pub expedition_place: String,
    /// Rendered comprobante effect, e.g. `I - Ingreso`.
    pub cfdi_effect: String,
    pub payment_form: String,
    pub payment_method: String,
}

/// One canonical line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub product_code: String,
    pub quantity: f64,
    pub unit_code: String,
    pub description: String,
    pub unit_price: f64,
    /// Explicit or computed `quantity × unit_price`; full precision.
    pub line_subtotal: f64,
    /// Explicit line total when the source supplied one, else 0 — the
    /// totals engine owns the fallback.
    pub line_total: f64,
    pub taxes: Vec<TaxEntry>,
}

/// One tax attached to a line item.
///
/// Retentions are subtracted from, not added to, the payable total and are
/// excluded from the additive VAT sum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxEntry {
    pub name: String,
    pub rate: f64,
    pub is_retention: bool,
    pub is_federal: bool,
    pub total: f64,
}

/// Derived monetary totals. Invariant after the fallback rules:
/// `|total − (subtotal + tax)| < 0.01`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}
