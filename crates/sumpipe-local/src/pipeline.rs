//! extract → truncate → chunk → summarize → aggregate.

use crate::config::{ExtractFailurePolicy, SumpipeConfig};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use sumpipe_core::{
    aggregate, chunk, truncate, Chunk, ChunkOutcome, ChunkRecord, Error, ExtractedText,
    Extractor, RawInput, Result, Summarizer, SummaryParams, SummaryReport,
};
use tracing::{debug, info, warn};

/// Per-run knobs. Built from `SumpipeConfig`, then overridden by the caller.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Keep only the first N characters of the extracted text (0 = keep all).
    pub truncate: usize,
    pub model_id: String,
    pub params: SummaryParams,
    pub max_chunk_chars: usize,
    /// Chunks in flight at once; 1 means strictly sequential.
    pub concurrency: usize,
    pub on_extract_error: ExtractFailurePolicy,
}

impl RunOptions {
    pub fn from_config(cfg: &SumpipeConfig) -> Self {
        Self {
            truncate: 0,
            model_id: cfg.model_id.clone(),
            params: SummaryParams::default(),
            max_chunk_chars: cfg.max_chunk_chars,
            concurrency: cfg.concurrency,
            on_extract_error: ExtractFailurePolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(Error::InvalidConfig(
                "max_chunk_chars must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.model_id.trim().is_empty() {
            return Err(Error::InvalidConfig("model id is empty".to_string()));
        }
        if let (Some(lo), Some(hi)) = (self.params.min_length, self.params.max_length) {
            if lo > hi {
                return Err(Error::InvalidConfig(format!(
                    "min_length ({lo}) is greater than max_length ({hi})"
                )));
            }
        }
        Ok(())
    }
}

pub struct Pipeline {
    extractor: Arc<dyn Extractor>,
    summarizer: Arc<dyn Summarizer>,
}

impl Pipeline {
    pub fn new(extractor: Arc<dyn Extractor>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            extractor,
            summarizer,
        }
    }

    /// Local extraction plus the hosted inference API, both configured from `cfg`.
    pub fn from_config(cfg: &SumpipeConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(crate::LocalExtractor::new(cfg)?),
            Arc::new(crate::HfInferenceClient::new(cfg)?),
        ))
    }

    /// Extract and truncate. This is what the input preview shows.
    pub async fn extract_input(&self, input: &RawInput, max_chars: usize) -> Result<ExtractedText> {
        let extracted = self.extractor.extract(input).await?;
        Ok(apply_truncation(extracted, max_chars))
    }

    pub async fn run(&self, input: &RawInput, opts: &RunOptions) -> Result<SummaryReport> {
        opts.validate()?;
        let t0 = Instant::now();

        let extracted = match self.extractor.extract(input).await {
            Ok(x) => x,
            Err(e)
                if e.is_extraction_failure()
                    && opts.on_extract_error == ExtractFailurePolicy::SummarizeAsText =>
            {
                warn!(error = %e, "extraction failed; summarizing the error text");
                ExtractedText::from_error(&e)
            }
            Err(e) => return Err(e),
        };
        let extracted = apply_truncation(extracted, opts.truncate);

        if extracted.text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        let chunks = chunk(&extracted.text, opts.max_chunk_chars);
        info!(
            summarizer = self.summarizer.name(),
            model_id = %opts.model_id,
            chars = extracted.chars(),
            chunks = chunks.len(),
            concurrency = opts.concurrency,
            "summarizing"
        );

        let outcomes = self.summarize_chunks(&chunks, opts).await;
        let summary = aggregate(&outcomes);
        if summary.has_failures() {
            warn!(
                failed = summary.failed_chunks,
                total = summary.total_chunks,
                "some chunks failed to summarize"
            );
        }
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "summary ready"
        );

        let chunk_records = chunks
            .iter()
            .zip(outcomes)
            .map(|(c, outcome)| ChunkRecord {
                index: c.index,
                start_char: c.start_char,
                chars: c.chars(),
                outcome,
            })
            .collect();

        Ok(SummaryReport {
            input_chars: extracted.chars(),
            extracted,
            model_id: opts.model_id.clone(),
            chunks: chunk_records,
            summary,
        })
    }

    /// One call per chunk, at most `opts.concurrency` in flight. Outcomes come back in chunk
    /// order regardless of completion order.
    async fn summarize_chunks(&self, chunks: &[Chunk], opts: &RunOptions) -> Vec<ChunkOutcome> {
        let summarizer = self.summarizer.as_ref();
        let model_id = opts.model_id.as_str();
        let params = &opts.params;
        stream::iter(chunks)
            .map(|c| async move {
                let t0 = Instant::now();
                let out = summarizer.summarize_chunk(&c.text, model_id, params).await;
                match out.error_kind() {
                    None => debug!(
                        chunk = c.index,
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "chunk summarized"
                    ),
                    Some(kind) => warn!(chunk = c.index, kind, "chunk failed"),
                }
                out
            })
            .buffered(opts.concurrency)
            .collect()
            .await
    }
}

fn apply_truncation(mut extracted: ExtractedText, max_chars: usize) -> ExtractedText {
    let clipped = truncate(&extracted.text, max_chars);
    if clipped.len() < extracted.text.len() {
        extracted.warnings.push("truncated");
        extracted.text = clipped;
    }
    extracted
}
