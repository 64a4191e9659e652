//! HTTP server binary for prefactura.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServiceConfig` and serves the axum router.

use anyhow::{Context, Result};
use clap::Parser;
use prefactura::config::{AnalysisConfig, IssuerDefaults};
use prefactura::render::LopdfRenderer;
use prefactura::server::{router, AppState};
use prefactura::{OpenAiProvider, ServiceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "prefactura-server",
    version,
    about = "Document intake and prefactura generation service",
    long_about = "HTTP service with two endpoints: POST /process-file analyzes base64 uploads \
(PDF text extraction or image vision analysis through any OpenAI-compatible endpoint), and \
POST /generate-pdf renders CFDI-style prefactura PDFs from invoice payloads.",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "PREFACTURA_BIND", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Directory for in-flight upload artifacts. Default: the OS temp dir.
    #[arg(long, env = "PREFACTURA_UPLOADS_DIR")]
    uploads_dir: Option<PathBuf>,

    /// Maximum JSON body size in megabytes.
    #[arg(long, env = "PREFACTURA_BODY_LIMIT_MB", default_value_t = 80)]
    body_limit_mb: usize,

    /// Base URL of an OpenAI-compatible chat-completions API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    analysis_base_url: String,

    /// Model identifier for analysis requests.
    #[arg(long, env = "PREFACTURA_MODEL", default_value = "gpt-5")]
    analysis_model: String,

    /// API key for the analysis endpoint. Omit for local endpoints.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Per-call analysis timeout in seconds.
    #[arg(long, env = "PREFACTURA_ANALYSIS_TIMEOUT", default_value_t = 60)]
    analysis_timeout: u64,

    /// Issuer name stamped on generated prefacturas.
    #[arg(long, env = "PREFACTURA_ISSUER_NAME")]
    issuer_name: Option<String>,

    /// Issuer RFC stamped on generated prefacturas.
    #[arg(long, env = "PREFACTURA_ISSUER_RFC")]
    issuer_rfc: Option<String>,

    /// Issuer address line.
    #[arg(long, env = "PREFACTURA_ISSUER_ADDRESS")]
    issuer_address: Option<String>,

    /// Issuer fiscal regime code.
    #[arg(long, env = "PREFACTURA_ISSUER_REGIME")]
    issuer_regime: Option<String>,

    /// Verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let mut builder = ServiceConfig::builder()
        .body_limit_bytes(cli.body_limit_mb * 1024 * 1024)
        .analysis(AnalysisConfig {
            base_url: cli.analysis_base_url,
            model: cli.analysis_model,
            api_key: cli.api_key,
            image_prompt: None,
            pdf_prompt: None,
            timeout_secs: cli.analysis_timeout,
        })
        .issuer(IssuerDefaults {
            name: cli.issuer_name,
            rfc: cli.issuer_rfc,
            address: cli.issuer_address,
            fiscal_regime: cli.issuer_regime,
        });
    if let Some(dir) = cli.uploads_dir {
        builder = builder.uploads_dir(dir);
    }
    let config = builder.build().context("invalid configuration")?;

    let provider = OpenAiProvider::new(config.analysis.clone())
        .context("failed to build analysis client")?;
    let state = Arc::new(AppState {
        config,
        provider: Arc::new(provider),
        renderer: Arc::new(LopdfRenderer),
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;
    info!("listening on {}", cli.bind);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
