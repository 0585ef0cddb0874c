use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;
use sumpipe_core::RawInput;

/// Where the text comes from. Exactly one is required.
#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// URL of an article or post to fetch.
    #[arg(long)]
    pub url: Option<String>,
    /// Text to summarize, given inline.
    #[arg(long)]
    pub text: Option<String>,
    /// Read the text from a file (`-` reads stdin).
    #[arg(long, value_name = "PATH|-")]
    pub text_file: Option<PathBuf>,
    /// PDF file to extract text from.
    #[arg(long, value_name = "PATH")]
    pub pdf: Option<PathBuf>,
}

impl SourceArgs {
    pub fn read(&self) -> Result<RawInput> {
        if let Some(u) = &self.url {
            return Ok(RawInput::Url(u.clone()));
        }
        if let Some(t) = &self.text {
            return Ok(RawInput::Text(t.clone()));
        }
        if let Some(p) = &self.text_file {
            let text = if p.as_os_str() == "-" {
                let mut s = String::new();
                std::io::stdin()
                    .read_to_string(&mut s)
                    .context("read text from stdin")?;
                s
            } else {
                std::fs::read_to_string(p)
                    .with_context(|| format!("read text file {}", p.display()))?
            };
            return Ok(RawInput::Text(text));
        }
        if let Some(p) = &self.pdf {
            let bytes =
                std::fs::read(p).with_context(|| format!("read pdf file {}", p.display()))?;
            if !sumpipe_local::extract::bytes_look_like_pdf(&bytes) {
                tracing::warn!(path = %p.display(), "file does not start with a PDF header");
            }
            return Ok(RawInput::Pdf(bytes));
        }
        anyhow::bail!("no input source given (use --url, --text, --text-file, or --pdf)")
    }
}
