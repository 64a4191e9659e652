//! Prefactura rendering: canonical invoice → PDF bytes.
//!
//! The renderer is a capability seam like the analysis provider: the server
//! depends on [`InvoiceRenderer`] and tests substitute fakes. Rendering is
//! modeled as a single-result async operation — one invoice in, one byte
//! buffer out, no streaming and no callback surface.
//!
//! [`LopdfRenderer`] produces the classic one-page CFDI print
//! representation: title, issuer and document-metadata columns, receiver
//! block, the line-item table (SAT product key, quantity, unit,
//! description, unit price, amount), payment data, and the
//! subtotal / IVA / total column.

use crate::error::ProcessError;
use crate::invoice::model::CanonicalInvoice;
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::debug;

/// The PDF rendering capability consumed by the invoice endpoint.
#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    async fn render(&self, invoice: &CanonicalInvoice) -> Result<Vec<u8>, ProcessError>;
}

/// Letter-size one-page prefactura built with `lopdf` primitives.
#[derive(Debug, Default)]
pub struct LopdfRenderer;

/// US Letter, points.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 40.0;

/// Item-table column x positions: key, qty, unit, description, price, amount.
const COLS: [f32; 6] = [40.0, 120.0, 165.0, 215.0, 420.0, 505.0];

#[async_trait]
impl InvoiceRenderer for LopdfRenderer {
    async fn render(&self, invoice: &CanonicalInvoice) -> Result<Vec<u8>, ProcessError> {
        // Document assembly is pure CPU work on small data; no blocking
        // concerns worth a spawn_blocking here.
        let bytes = build_document(invoice)
            .map_err(|e| ProcessError::RenderFailed(e.to_string()))?;
        debug!("rendered prefactura ({} bytes)", bytes.len());
        Ok(bytes)
    }
}

/// Format an MXN amount as `$1,234.56`.
pub fn format_money(v: f64) -> String {
    let negative = v < 0.0;
    let cents = (v.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}${grouped}.{frac:02}")
}

fn build_document(invoice: &CanonicalInvoice) -> lopdf::Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id, "F2" => bold_id },
    });

    let content = page_content(invoice);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// A tiny cursor-based text layouter over PDF content operations.
struct Layout {
    ops: Vec<Operation>,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN - 12.0,
        }
    }

    fn text_at(&mut self, x: f32, y: f32, font: &str, size: f32, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![font.into(), size.into()]));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(
                win_ansi(text),
                lopdf::StringFormat::Literal,
            )],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn line(&mut self, x: f32, font: &str, size: f32, text: &str) {
        self.text_at(x, self.y, font, size, text);
    }

    /// Right-align by approximating Helvetica advance at half the font size.
    fn line_right(&mut self, right_edge: f32, font: &str, size: f32, text: &str) {
        let width = text.chars().count() as f32 * size * 0.5;
        self.text_at(right_edge - width, self.y, font, size, text);
    }

    fn advance(&mut self, dy: f32) {
        self.y -= dy;
    }

    fn rule(&mut self) {
        self.ops.push(Operation::new(
            "m",
            vec![MARGIN.into(), self.y.into()],
        ));
        self.ops.push(Operation::new(
            "l",
            vec![(PAGE_WIDTH - MARGIN).into(), self.y.into()],
        ));
        self.ops.push(Operation::new("S", vec![]));
    }
}

fn page_content(invoice: &CanonicalInvoice) -> Content {
    let mut l = Layout::new();
    let right_edge = PAGE_WIDTH - MARGIN;

    // Title
    l.text_at(PAGE_WIDTH / 2.0 - 50.0, l.y, "F2", 16.0, "PREFACTURA");
    l.advance(30.0);

    // Issuer column (left) and document metadata (right)
    let block_top = l.y;
    l.line(MARGIN, "F2", 10.0, "Emisor:");
    l.advance(13.0);
    l.line(MARGIN, "F1", 10.0, &invoice.issuer.name);
    l.advance(13.0);
    l.line(MARGIN, "F1", 10.0, &invoice.issuer.rfc);
    l.advance(13.0);
    if !invoice.issuer.address.is_empty() {
        l.line(MARGIN, "F1", 10.0, &invoice.issuer.address);
        l.advance(13.0);
    }
    l.line(
        MARGIN,
        "F1",
        10.0,
        &format!("Régimen Fiscal: {}", invoice.issuer.fiscal_regime),
    );
    let issuer_bottom = l.y;

    l.y = block_top;
    l.line_right(right_edge, "F1", 10.0, &format!("Folio: {}", invoice.meta.folio));
    l.advance(13.0);
    l.line_right(right_edge, "F1", 10.0, &format!("Fecha: {}", invoice.meta.date));
    l.advance(13.0);
    l.line_right(
        right_edge,
        "F1",
        10.0,
        &format!("Lugar de Expedición: {}", invoice.meta.expedition_place),
    );
    l.advance(13.0);
    l.line_right(
        right_edge,
        "F1",
        10.0,
        &format!("Efecto del comprobante: {}", invoice.meta.cfdi_effect),
    );

    l.y = issuer_bottom;
    l.advance(14.0);
    l.rule();
    l.advance(18.0);

    // Receiver block
    l.line(MARGIN, "F2", 10.0, "Receptor:");
    l.advance(13.0);
    l.line(MARGIN, "F1", 10.0, &invoice.receiver.name);
    l.advance(13.0);
    l.line(MARGIN, "F1", 10.0, &invoice.receiver.rfc);
    l.advance(13.0);
    l.line(
        MARGIN,
        "F1",
        10.0,
        &format!("Uso del CFDI: {}", invoice.receiver.cfdi_use),
    );
    l.advance(13.0);
    l.line(
        MARGIN,
        "F1",
        10.0,
        &format!("Régimen Fiscal: {}", invoice.receiver.fiscal_regime),
    );
    l.advance(13.0);
    l.line(
        MARGIN,
        "F1",
        10.0,
        &format!("Código Postal: {}", invoice.receiver.tax_zip_code),
    );
    l.advance(22.0);

    // Item table
    let headers = [
        "Clave ProdServ",
        "Cantidad",
        "Unidad",
        "Descripción",
        "Precio Unitario",
        "Importe",
    ];
    for (x, h) in COLS.iter().zip(headers) {
        l.text_at(*x, l.y, "F2", 9.0, h);
    }
    l.advance(5.0);
    l.rule();
    l.advance(13.0);

    for item in &invoice.items {
        let cells = [
            item.product_code.clone(),
            trim_number(item.quantity),
            item.unit_code.clone(),
            truncate(&item.description, 40),
            format_money(item.unit_price),
            format_money(item.line_subtotal),
        ];
        for (x, cell) in COLS.iter().zip(cells.iter()) {
            l.text_at(*x, l.y, "F1", 9.0, cell);
        }
        l.advance(13.0);
    }
    l.advance(4.0);
    l.rule();
    l.advance(18.0);

    // Payment data (left) and totals (right)
    let totals_top = l.y;
    l.line(
        MARGIN,
        "F1",
        10.0,
        &format!("Forma de Pago: {}", invoice.meta.payment_form),
    );
    l.advance(13.0);
    l.line(
        MARGIN,
        "F1",
        10.0,
        &format!("Método de Pago: {}", invoice.meta.payment_method),
    );

    l.y = totals_top;
    l.line_right(
        right_edge,
        "F1",
        10.0,
        &format!("Subtotal: {}", format_money(invoice.totals.subtotal)),
    );
    l.advance(13.0);
    l.line_right(
        right_edge,
        "F1",
        10.0,
        &format!("IVA (16%): {}", format_money(invoice.totals.tax)),
    );
    l.advance(13.0);
    l.line_right(
        right_edge,
        "F2",
        10.0,
        &format!("Total: {}", format_money(invoice.totals.total)),
    );

    // Footer
    l.text_at(
        PAGE_WIDTH / 2.0 - 140.0,
        60.0,
        "F1",
        9.0,
        "Este documento es una representación impresa de un CFDI.",
    );

    Content { operations: l.ops }
}

/// Encode text as WinAnsi (Latin-1) bytes; characters outside the range
/// degrade to `?` rather than corrupting the stream.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

/// Print a quantity without a trailing `.0` for whole numbers.
fn trim_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars - 3).collect();
        format!("{cut}...")
    }
}

// ── Minimal PDF builders shared by unit tests ────────────────────────────

#[cfg(test)]
pub(crate) mod tests_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// A structurally valid single-page PDF with no text at all —
    /// the shape of a scanned document after rasterisation.
    pub fn minimal_pdf_without_text() -> Vec<u8> {
        build(None)
    }

    /// A single-page PDF whose content stream draws `text`.
    pub fn minimal_pdf_with_text(text: &str) -> Vec<u8> {
        build(Some(text))
    }

    fn build(text: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = Vec::new();
        if let Some(t) = text {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(t)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::invoice::normalize::Normalizer;
    use crate::invoice::schema::InvoicePayload;
    use serde_json::json;

    fn sample_invoice() -> CanonicalInvoice {
        let payload = InvoicePayload::from_value(json!({
            "Folio": "A-42",
            "Receiver": { "Name": "ACME SA DE CV" },
            "Items": [{
                "Description": "Bomba centrífuga 1/2 hp",
                "Quantity": 1.0,
                "UnitPrice": 3017.24,
                "Subtotal": 3017.24,
                "Taxes": [{ "Name": "IVA", "Total": 482.76 }],
            }],
        }))
        .unwrap();
        let config = ServiceConfig::default();
        Normalizer::new(&config).normalize(&payload).unwrap()
    }

    #[tokio::test]
    async fn renders_a_parseable_pdf() {
        let bytes = LopdfRenderer.render(&sample_invoice()).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        // It must load back and carry the document text.
        let text = crate::pipeline::pdftext::extract_text(&bytes)
            .unwrap()
            .expect("prefactura carries text");
        assert!(text.contains("PREFACTURA"), "got: {text}");
        assert!(text.contains("ACME SA DE CV"));
        assert!(text.contains("3,017.24"));
    }

    #[test]
    fn money_is_grouped_and_padded() {
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(16.0), "$16.00");
        assert_eq!(format_money(3017.24), "$3,017.24");
        assert_eq!(format_money(1234567.5), "$1,234,567.50");
        assert_eq!(format_money(-42.1), "-$42.10");
    }

    #[test]
    fn quantities_drop_trailing_zero() {
        assert_eq!(trim_number(1.0), "1");
        assert_eq!(trim_number(2.5), "2.5");
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "x".repeat(120);
        assert_eq!(truncate(&long, 40).chars().count(), 40);
    }
}
