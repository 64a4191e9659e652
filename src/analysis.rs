//! Analysis capability: the vision/text model behind the intake pipeline.
//!
//! The pipeline treats the model as an opaque capability mapping
//! image-or-text to a structured result or a summary. [`AnalysisProvider`]
//! is that seam: the dispatcher depends on the trait, the server wires in
//! [`OpenAiProvider`], and tests substitute fakes.
//!
//! ## Result contract
//!
//! On success exactly one of [`Analysis::structured`] or
//! [`Analysis::summary`] is populated — structured when the model answered
//! with parseable JSON, summary otherwise. Failures split into two error
//! classes: the capability *rejecting the input* (bad image, relayed as a
//! client error) versus the capability *itself failing* (unreachable,
//! internal fault). The core performs no retry or backoff; that belongs to
//! the capability's own client if anywhere.

use crate::config::AnalysisConfig;
use crate::error::ProcessError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Default prompt for image analysis.
pub const DEFAULT_IMAGE_PROMPT: &str =
    "Extrae texto clave y da un breve resumen del contenido de la imagen.";

/// Default prompt for extracted PDF text.
pub const DEFAULT_PDF_PROMPT: &str =
    "Analiza el siguiente texto extraído de un PDF. Extrae los datos clave y da un breve resumen.";

/// Prompt for the medical-document image route: structured JSON out.
pub const MEDICAL_IMAGE_PROMPT: &str =
    "Analiza la imagen de un documento médico (receta, informe o estudio). \
     Extrae los datos clave y responde únicamente con un JSON estructurado.";

/// Outcome of a successful analysis call.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Parsed JSON, when the model answered with a JSON object.
    pub structured: Option<Value>,
    /// Free-text summary otherwise.
    pub summary: Option<String>,
}

impl Analysis {
    /// Wrap raw model output, parsing it as JSON when possible.
    ///
    /// Keeps the either/or contract: a response that parses as a JSON
    /// object becomes `structured`, anything else becomes `summary`.
    pub fn from_model_output(content: &str) -> Self {
        let trimmed = content.trim();
        match serde_json::from_str::<Value>(trimmed) {
            Ok(v) if v.is_object() || v.is_array() => Self {
                structured: Some(v),
                summary: None,
            },
            _ => Self {
                structured: None,
                summary: Some(trimmed.to_string()),
            },
        }
    }
}

/// The vision/text analysis capability consumed by the dispatcher.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Analyze an image presented as a validated data-URL, with an explicit
    /// instruction prompt. The prompt-specialized routes (medical, nota)
    /// go through here.
    async fn analyze_image_with_prompt(
        &self,
        data_url: &str,
        mime: &str,
        prompt: &str,
    ) -> Result<Analysis, ProcessError>;

    /// Analyze an image with the default instruction.
    async fn analyze_image(&self, data_url: &str, mime: &str) -> Result<Analysis, ProcessError> {
        self.analyze_image_with_prompt(data_url, mime, DEFAULT_IMAGE_PROMPT)
            .await
    }

    /// Analyze text extracted from a PDF.
    async fn analyze_pdf_text(
        &self,
        text: &str,
        filename_hint: Option<&str>,
    ) -> Result<Analysis, ProcessError>;
}

/// OpenAI-compatible chat-completions client.
///
/// Works against api.openai.com or any compatible local endpoint; only the
/// base URL, model, and optional API key vary.
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: AnalysisConfig,
}

impl OpenAiProvider {
    pub fn new(config: AnalysisConfig) -> Result<Self, ProcessError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProcessError::Internal(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn chat(&self, content: Value) -> Result<Analysis, ProcessError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": content }],
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProcessError::AnalysisFailed(format!("request to {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.map(|e| e.message))
                .unwrap_or_else(|| format!("HTTP {status}"));
            warn!("analysis endpoint returned {status}: {detail}");
            // 4xx means the endpoint understood us and refused the input;
            // everything else is the capability's own fault.
            return if status.is_client_error() {
                Err(ProcessError::AnalysisRejected(detail))
            } else {
                Err(ProcessError::AnalysisFailed(detail))
            };
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProcessError::AnalysisFailed(format!("malformed response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!("analysis returned {} chars", content.len());
        Ok(Analysis::from_model_output(&content))
    }
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    async fn analyze_image_with_prompt(
        &self,
        data_url: &str,
        mime: &str,
        prompt: &str,
    ) -> Result<Analysis, ProcessError> {
        debug!("analyzing image ({mime})");
        self.chat(json!([
            { "type": "text", "text": prompt },
            { "type": "image_url", "image_url": { "url": data_url } },
        ]))
        .await
    }

    async fn analyze_image(&self, data_url: &str, mime: &str) -> Result<Analysis, ProcessError> {
        // The configured override applies to the default route only.
        let prompt = self
            .config
            .image_prompt
            .as_deref()
            .unwrap_or(DEFAULT_IMAGE_PROMPT);
        self.analyze_image_with_prompt(data_url, mime, prompt).await
    }

    async fn analyze_pdf_text(
        &self,
        text: &str,
        filename_hint: Option<&str>,
    ) -> Result<Analysis, ProcessError> {
        let prompt = self
            .config
            .pdf_prompt
            .as_deref()
            .unwrap_or(DEFAULT_PDF_PROMPT);
        let hint = filename_hint
            .map(|f| format!("Archivo: {f}\n\n"))
            .unwrap_or_default();
        self.chat(json!(format!("{prompt}\n\n{hint}{text}"))).await
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_output_becomes_structured() {
        let a = Analysis::from_model_output(r#"{"total": 116.0, "folio": "A-1"}"#);
        assert!(a.structured.is_some());
        assert!(a.summary.is_none());
    }

    #[test]
    fn prose_output_becomes_summary() {
        let a = Analysis::from_model_output("Nota de compra por $116.00 MXN.");
        assert!(a.structured.is_none());
        assert_eq!(a.summary.as_deref(), Some("Nota de compra por $116.00 MXN."));
    }

    #[test]
    fn bare_number_is_not_structured() {
        // A stray "42" parses as JSON but is not a useful structure.
        let a = Analysis::from_model_output("42");
        assert!(a.structured.is_none());
        assert_eq!(a.summary.as_deref(), Some("42"));
    }
}
