//! Service configuration.
//!
//! All behaviour is controlled through one [`ServiceConfig`] built via its
//! [`ServiceConfigBuilder`]. Keeping every knob in a single injected struct —
//! including the fiscal fallback identities that the invoice normalizer
//! applies — makes defaults testable and overridable; nothing in the request
//! path reads the process environment.
//!
//! # Design choice: builder over constructor
//! The fiscal-defaults surface alone is a dozen fields. The builder lets
//! callers set only what they care about and rely on documented defaults for
//! the rest.

use crate::error::ProcessError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the intake and invoice pipelines.
///
/// Built via [`ServiceConfig::builder()`] or [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use prefactura::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .uploads_dir("/tmp/prefactura-uploads")
///     .vat_rate(0.16)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory where decoded uploads are written for inspection while a
    /// request is in flight. Each artifact is released when the request
    /// finishes, on every exit path. Default: the OS temp dir.
    pub uploads_dir: PathBuf,

    /// Maximum accepted JSON body size in bytes. Default: 80 MB.
    ///
    /// Base64 inflates payloads by ~33%, so a 60 MB PDF arrives as ~80 MB of
    /// JSON. Raise this if clients send larger documents.
    pub body_limit_bytes: usize,

    /// Analysis capability settings (endpoint, model, prompts).
    pub analysis: AnalysisConfig,

    /// Issuer identity stamped on generated prefacturas when the payload
    /// carries none. Fields left `None` render as `N/A`.
    pub issuer: IssuerDefaults,

    /// Receiver fallbacks applied by the normalizer. The defaults are the
    /// SAT generic public consumer identity.
    pub receiver: ReceiverDefaults,

    /// Document-level fallbacks (folio, payment form, ...).
    pub document: DocumentDefaults,

    /// Flat VAT rate used only when a payload carries no explicit tax
    /// breakdown. This is a heuristic, not a tax-law computation.
    /// Default: 0.16.
    pub vat_rate: f64,
}

/// Settings for the vision/text analysis capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Base URL of an OpenAI-compatible chat-completions API.
    pub base_url: String,
    /// Model identifier sent with every analysis request.
    pub model: String,
    /// API key. `None` sends no Authorization header (local endpoints).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Override for the image-analysis prompt.
    pub image_prompt: Option<String>,
    /// Override for the PDF-text analysis prompt.
    pub pdf_prompt: Option<String>,
    /// Per-call timeout in seconds. Default: 60.
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-5".to_string(),
            api_key: None,
            image_prompt: None,
            pdf_prompt: None,
            timeout_secs: 60,
        }
    }
}

/// Issuer block fallbacks for rendered prefacturas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuerDefaults {
    pub name: Option<String>,
    pub rfc: Option<String>,
    pub address: Option<String>,
    pub fiscal_regime: Option<String>,
}

/// Receiver block fallbacks applied by the invoice normalizer.
///
/// The defaults are the SAT codes for an anonymous retail sale:
/// generic public consumer RFC, CFDI use `S01` (no fiscal effects),
/// regime `616` (no fiscal obligations).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverDefaults {
    pub name: String,
    pub rfc: String,
    pub cfdi_use: String,
    pub fiscal_regime: String,
    pub tax_zip_code: String,
}

impl Default for ReceiverDefaults {
    fn default() -> Self {
        Self {
            name: "PUBLICO EN GENERAL".to_string(),
            rfc: "XAXX010101000".to_string(),
            cfdi_use: "S01".to_string(),
            fiscal_regime: "616".to_string(),
            tax_zip_code: "N/A".to_string(),
        }
    }
}

/// Document-level fallbacks applied by the invoice normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDefaults {
    pub folio: String,
    pub cfdi_type: String,
    pub expedition_place: String,
    pub payment_form: String,
    pub payment_method: String,
    /// SAT generic product/service key applied to items without one.
    pub product_code: String,
    /// SAT unit key for "piece", applied to items without one.
    pub unit_code: String,
}

impl Default for DocumentDefaults {
    fn default() -> Self {
        Self {
            folio: "S/N".to_string(),
            cfdi_type: "I".to_string(),
            expedition_place: "N/A".to_string(),
            payment_form: "01".to_string(),
            payment_method: "PUE".to_string(),
            product_code: "01010101".to_string(),
            unit_code: "H87".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            uploads_dir: std::env::temp_dir(),
            body_limit_bytes: 80 * 1024 * 1024,
            analysis: AnalysisConfig::default(),
            issuer: IssuerDefaults::default(),
            receiver: ReceiverDefaults::default(),
            document: DocumentDefaults::default(),
            vat_rate: 0.16,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.uploads_dir = dir.into();
        self
    }

    pub fn body_limit_bytes(mut self, n: usize) -> Self {
        self.config.body_limit_bytes = n;
        self
    }

    pub fn analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.config.analysis = analysis;
        self
    }

    pub fn issuer(mut self, issuer: IssuerDefaults) -> Self {
        self.config.issuer = issuer;
        self
    }

    pub fn receiver(mut self, receiver: ReceiverDefaults) -> Self {
        self.config.receiver = receiver;
        self
    }

    pub fn document(mut self, document: DocumentDefaults) -> Self {
        self.config.document = document;
        self
    }

    pub fn vat_rate(mut self, rate: f64) -> Self {
        self.config.vat_rate = rate;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ProcessError> {
        let c = &self.config;
        if !(0.0..=1.0).contains(&c.vat_rate) {
            return Err(ProcessError::Internal(format!(
                "vat_rate must be within 0.0–1.0, got {}",
                c.vat_rate
            )));
        }
        if c.body_limit_bytes == 0 {
            return Err(ProcessError::Internal(
                "body_limit_bytes must be positive".into(),
            ));
        }
        Ok(self.config)
    }
}
