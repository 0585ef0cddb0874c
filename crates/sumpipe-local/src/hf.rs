use crate::config::SumpipeConfig;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use sumpipe_core::{ChunkOutcome, Error, Result, SummarizeError, Summarizer, SummaryParams};
use tracing::{debug, warn};

/// Input the diagnostic probe sends.
pub const PROBE_INPUT: &str = "Hello, world!";

/// Client for the Hugging Face hosted inference API (`POST {base}/models/{model_id}`).
#[derive(Clone)]
pub struct HfInferenceClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for HfInferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfInferenceClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a SummaryParams>,
}

impl HfInferenceClient {
    pub fn new(cfg: &SumpipeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(cfg.hf_timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self::with_client(
            client,
            cfg.hf_base_url.clone(),
            cfg.hf_token.clone(),
        ))
    }

    pub fn with_client(client: reqwest::Client, base_url: String, token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            token,
        }
    }

    pub fn endpoint(&self, model_id: &str) -> String {
        format!(
            "{}/models/{}",
            self.base_url.trim_end_matches('/'),
            model_id
        )
    }

    fn post(&self, token: &str, model_id: &str, body: &InferenceRequest<'_>) -> reqwest::RequestBuilder {
        self.client
            .post(self.endpoint(model_id))
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(body)
    }

    /// One raw request with a fixed greeting; returns `(status, body)` untouched.
    pub async fn probe(&self, model_id: &str) -> Result<(u16, String)> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Error::NotConfigured("missing HF_TOKEN".to_string()))?;
        let body = InferenceRequest {
            inputs: PROBE_INPUT,
            parameters: None,
        };
        let resp = self
            .post(token, model_id, &body)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok((status, text))
    }
}

/// Pick the summary out of a successful response body.
///
/// Known shapes are `[{"generated_text": ..}]` and `[{"summary_text": ..}]` (checked in that
/// order). Anything else is returned as compact JSON.
pub fn summary_from_response(v: &Value) -> String {
    if let Some(first) = v.as_array().and_then(|a| a.first()) {
        for key in ["generated_text", "summary_text"] {
            if let Some(field) = first.get(key) {
                return match field.as_str() {
                    Some(s) => s.to_string(),
                    None => field.to_string(),
                };
            }
        }
    }
    v.to_string()
}

#[async_trait::async_trait]
impl Summarizer for HfInferenceClient {
    fn name(&self) -> &'static str {
        "huggingface"
    }

    async fn summarize_chunk(
        &self,
        chunk: &str,
        model_id: &str,
        params: &SummaryParams,
    ) -> ChunkOutcome {
        let Some(token) = self.token.as_deref() else {
            warn!(model_id, "HF_TOKEN is not set; skipping inference call");
            return ChunkOutcome::Failed(SummarizeError::MissingCredential);
        };

        let body = InferenceRequest {
            inputs: chunk,
            parameters: (!params.is_empty()).then_some(params),
        };
        let t0 = Instant::now();
        let resp = match self.post(token, model_id, &body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(model_id, error = %e, "inference request failed");
                return ChunkOutcome::Failed(SummarizeError::Transport(e.to_string()));
            }
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => {
                warn!(model_id, error = %e, "inference response body could not be read");
                return ChunkOutcome::Failed(SummarizeError::Transport(e.to_string()));
            }
        };
        debug!(
            model_id,
            status = status.as_u16(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "inference response"
        );

        if status != reqwest::StatusCode::OK {
            return ChunkOutcome::Failed(SummarizeError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(v) => ChunkOutcome::Summary(summary_from_response(&v)),
            Err(e) => ChunkOutcome::Failed(SummarizeError::Decode(e.to_string())),
        }
    }
}
