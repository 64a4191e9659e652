//! # prefactura
//!
//! Document intake and prefactura generation for a Mexican invoicing
//! workflow.
//!
//! ## Why this crate?
//!
//! Two jobs share one service. First, uploads arrive as base64 blobs with
//! unreliable metadata: the declared mime type, the data-URL envelope, the
//! filename, and the bytes themselves routinely disagree, and the service
//! must still pick one interpretation and either analyze the document or
//! say clearly why it cannot. Second, invoice payloads arrive in two
//! incompatible JSON schemas and must come out as one canonical CFDI-style
//! prefactura PDF with correct totals.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (base64)
//!  │
//!  ├─ 1. Decode    strip data-URL envelope, validate base64
//!  ├─ 2. Persist   temp artifact, released on every exit path
//!  ├─ 3. Classify  hint ▸ declared mime ▸ envelope ▸ magic bytes ▸ extension
//!  ├─ 4. Dispatch  PDF → embedded text → analysis
//!  │               image → validate/re-encode → vision analysis
//!  └─ 5. Respond   analysis result, or a declared limitation (ok:false)
//!
//! invoice (JSON, either schema)
//!  │
//!  ├─ 1. Detect    structural predicate, once, at the boundary
//!  ├─ 2. Normalize canonical model + CFDI defaults
//!  ├─ 3. Totals    subtotal / IVA (with flat-rate fallback) / total
//!  └─ 4. Render    one-page prefactura PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prefactura::invoice::normalize::Normalizer;
//! use prefactura::invoice::schema::InvoicePayload;
//! use prefactura::render::{InvoiceRenderer, LopdfRenderer};
//! use prefactura::ServiceConfig;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::default();
//! let payload = InvoicePayload::from_value(serde_json::json!({
//!     "Receiver": { "Name": "ACME SA DE CV" },
//!     "Items": [{ "Quantity": 1, "UnitPrice": 100.0, "Subtotal": 100.0 }],
//! }))?;
//! let invoice = Normalizer::new(&config).normalize(&payload)?;
//! let pdf = LopdfRenderer.render(&invoice).await?;
//! std::fs::write("prefactura.pdf", pdf)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | Enables the `prefactura-server` binary and the axum HTTP surface |
//!
//! Disable `server` when embedding only the pipelines:
//! ```toml
//! prefactura = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod error;
pub mod invoice;
pub mod pipeline;
pub mod render;

#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{Analysis, AnalysisProvider, OpenAiProvider};
pub use config::{AnalysisConfig, ServiceConfig, ServiceConfigBuilder};
pub use error::ProcessError;
pub use pipeline::dispatch::{
    process_image, process_upload, DispatchOutcome, ImageAnalysisOutcome, UploadRequest,
};
pub use render::{InvoiceRenderer, LopdfRenderer};
