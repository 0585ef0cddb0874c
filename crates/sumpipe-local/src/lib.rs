use std::time::{Duration, Instant};
use sumpipe_core::{Error, ExtractedText, Extractor, RawInput, Result};
use tracing::{debug, info};

pub mod config;
pub mod extract;
pub mod hf;
pub mod pipeline;

pub use config::{ExtractFailurePolicy, SumpipeConfig};
pub use hf::HfInferenceClient;
pub use pipeline::{Pipeline, RunOptions};

/// Turns a `RawInput` into plain text: fetches URLs, parses HTML and PDF bodies.
#[derive(Debug, Clone)]
pub struct LocalExtractor {
    client: reqwest::Client,
}

impl LocalExtractor {
    pub fn new(cfg: &SumpipeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(cfg.fetch_timeout.min(Duration::from_secs(10)))
            .timeout(cfg.fetch_timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    /// GET the page body as text. The status code is not checked: error pages are parsed
    /// like any other page.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let url = url::Url::parse(url.trim()).map_err(|e| Error::Fetch(format!("{e}: {url}")))?;
        let t0 = Instant::now();
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| Error::Fetch(e.to_string()))?;
        debug!(
            status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "fetched url"
        );
        Ok(body)
    }
}

#[async_trait::async_trait]
impl Extractor for LocalExtractor {
    async fn extract(&self, input: &RawInput) -> Result<ExtractedText> {
        let t0 = Instant::now();
        let out = match input {
            RawInput::Text(t) => ExtractedText::pasted(t.clone()),
            RawInput::Url(u) => {
                let body = self.fetch_text(u).await?;
                tokio::task::spawn_blocking(move || extract::html_to_paragraph_text(&body))
                    .await
                    .map_err(|e| Error::Fetch(format!("html parse join failed: {e}")))?
            }
            RawInput::Pdf(bytes) => {
                let bytes = bytes.clone();
                tokio::task::spawn_blocking(move || extract::pdf_to_text(&bytes))
                    .await
                    .map_err(|e| Error::Pdf(format!("pdf join failed: {e}")))??
            }
        };
        info!(
            source = input.kind(),
            engine = out.engine,
            chars = out.chars(),
            warnings = ?out.warnings,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "extracted text"
        );
        Ok(out)
    }
}
