use serde::Serialize;
use std::fmt;

/// Default window size for the summarization endpoint (characters, not bytes).
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 4000;

/// The only model the hosted summarizer is known to answer for out of the box.
pub const DEFAULT_MODEL_ID: &str = "facebook/bart-large-cnn";

/// How much of the extracted text the input preview shows.
pub const PREVIEW_CHARS: usize = 5000;

/// Separator between per-chunk summaries in the final summary.
pub const SUMMARY_SEPARATOR: &str = "\n\n";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Any failure while retrieving a URL (bad URL, connect, timeout, body read).
    ///
    /// The display string is also the legacy "content" used when extraction errors are
    /// summarized as text, so keep the prefix stable.
    #[error("ERROR fetching URL: {0}")]
    Fetch(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("No input text found. Please provide a URL, text, or PDF.")]
    EmptyInput,
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    /// True for errors raised while turning a `RawInput` into text.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::Pdf(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// One user-selected source of text.
#[derive(Clone, PartialEq, Eq)]
pub enum RawInput {
    Url(String),
    Text(String),
    Pdf(Vec<u8>),
}

impl RawInput {
    pub fn kind(&self) -> &'static str {
        match self {
            RawInput::Url(_) => "url",
            RawInput::Text(_) => "text",
            RawInput::Pdf(_) => "pdf",
        }
    }
}

impl fmt::Debug for RawInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never dump pasted text or PDF bytes into logs.
        match self {
            RawInput::Url(u) => f.debug_tuple("Url").field(u).finish(),
            RawInput::Text(t) => write!(f, "Text({} chars)", t.chars().count()),
            RawInput::Pdf(b) => write!(f, "Pdf({} bytes)", b.len()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExtractedText {
    /// Which extraction path produced `text` (e.g. "paste", "html-article", "pdf-extract").
    pub engine: &'static str,
    pub text: String,
    /// Stable snake_case codes; empty on the happy path.
    pub warnings: Vec<&'static str>,
}

impl ExtractedText {
    pub fn new(engine: &'static str, text: String) -> Self {
        Self {
            engine,
            text,
            warnings: Vec::new(),
        }
    }

    pub fn pasted(text: String) -> Self {
        Self::new("paste", text)
    }

    /// The legacy behavior: an extraction error becomes the text itself.
    pub fn from_error(err: &Error) -> Self {
        Self {
            engine: "error",
            text: err.to_string(),
            warnings: vec!["extraction_failed"],
        }
    }

    pub fn chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// A contiguous window of the input text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Character offset into the text the chunk was cut from.
    pub start_char: usize,
    pub text: String,
}

impl Chunk {
    pub fn chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// Keep the first `n` characters of `text`. `n == 0` means "no truncation".
pub fn truncate(text: &str, n: usize) -> String {
    if n == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(n) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}

/// Split `text` into non-overlapping windows of `max_chars` characters.
///
/// Produces `ceil(chars / max_chars)` chunks (none for empty text); only the last one may be
/// shorter. `max_chars == 0` is treated as unbounded (a single chunk) so this never loops.
pub fn chunk(text: &str, max_chars: usize) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 {
        return vec![Chunk {
            index: 0,
            start_char: 0,
            text: text.to_string(),
        }];
    }

    let mut out = Vec::new();
    let mut start_byte = 0usize;
    let mut start_char = 0usize;
    let mut n = 0usize;
    for (byte, _) in text.char_indices() {
        if n == max_chars {
            out.push(Chunk {
                index: out.len(),
                start_char,
                text: text[start_byte..byte].to_string(),
            });
            start_byte = byte;
            start_char += n;
            n = 0;
        }
        n += 1;
    }
    out.push(Chunk {
        index: out.len(),
        start_char,
        text: text[start_byte..].to_string(),
    });
    out
}

/// Bounded preview: the first `max_chars` characters, with "..." appended when clipped.
pub fn preview(text: &str, max_chars: usize) -> String {
    let head = truncate(text, max_chars);
    if head.len() < text.len() {
        format!("{head}...")
    } else {
        head
    }
}

/// Why a single chunk could not be summarized.
///
/// `Display` renders the exact strings the tool has always emitted in place of a summary, so a
/// final summary built from failed chunks reads the same as before.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SummarizeError {
    #[error("Error: Hugging Face token not found in environment variable HF_TOKEN")]
    MissingCredential,
    #[error("Error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Error connecting to Hugging Face: {0}")]
    Transport(String),
    /// A 200 response whose body was not JSON.
    #[error("Error connecting to Hugging Face: {0}")]
    Decode(String),
}

impl SummarizeError {
    pub fn kind(&self) -> &'static str {
        match self {
            SummarizeError::MissingCredential => "missing_credential",
            SummarizeError::Status { .. } => "http_status",
            SummarizeError::Transport(_) => "transport",
            SummarizeError::Decode(_) => "decode",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Summary(String),
    Failed(SummarizeError),
}

impl ChunkOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ChunkOutcome::Summary(_))
    }

    pub fn error_kind(&self) -> Option<&'static str> {
        match self {
            ChunkOutcome::Summary(_) => None,
            ChunkOutcome::Failed(e) => Some(e.kind()),
        }
    }

    /// Text as it appears in the final summary.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChunkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkOutcome::Summary(s) => f.write_str(s),
            ChunkOutcome::Failed(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FinalSummary {
    pub text: String,
    pub total_chunks: usize,
    pub failed_chunks: usize,
}

impl FinalSummary {
    pub fn has_failures(&self) -> bool {
        self.failed_chunks > 0
    }
}

/// Join rendered outcomes with a blank line, in order.
pub fn aggregate(outcomes: &[ChunkOutcome]) -> FinalSummary {
    let text = outcomes
        .iter()
        .map(ChunkOutcome::render)
        .collect::<Vec<_>>()
        .join(SUMMARY_SEPARATOR);
    FinalSummary {
        text,
        total_chunks: outcomes.len(),
        failed_chunks: outcomes.iter().filter(|o| !o.is_ok()).count(),
    }
}

/// Optional length hints forwarded to the summarization model.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SummaryParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl SummaryParams {
    pub fn is_empty(&self) -> bool {
        self.min_length.is_none() && self.max_length.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub index: usize,
    pub start_char: usize,
    pub chars: usize,
    pub outcome: ChunkOutcome,
}

/// Everything one summarize run produced.
#[derive(Debug, Clone)]
pub struct SummaryReport {
    pub extracted: ExtractedText,
    /// Characters that went into chunking (after truncation).
    pub input_chars: usize,
    pub model_id: String,
    pub chunks: Vec<ChunkRecord>,
    pub summary: FinalSummary,
}

#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, input: &RawInput) -> Result<ExtractedText>;
}

/// A remote (or stub) summarizer. Failures are returned as outcomes, never raised.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn summarize_chunk(
        &self,
        chunk: &str,
        model_id: &str,
        params: &SummaryParams,
    ) -> ChunkOutcome;
}
