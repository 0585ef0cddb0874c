use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use sumpipe_core::{preview, Error, ExtractedText, SummaryReport, PREVIEW_CHARS};
use sumpipe_local::{ExtractFailurePolicy, HfInferenceClient, Pipeline, RunOptions, SumpipeConfig};

mod source;
use source::SourceArgs;

/// Exit code for "nothing to summarize".
const EXIT_EMPTY_INPUT: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "sumpipe")]
#[command(
    about = "Summarize a URL, pasted text, or a PDF through a hosted inference API",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract text from a source and print the input preview.
    Extract(ExtractCmd),
    /// Extract, chunk, and summarize a source; writes the summary to a text file.
    Summarize(SummarizeCmd),
    /// Send one fixed request to the inference endpoint and print the raw status and body.
    Probe(ProbeCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ExtractCmd {
    #[command(flatten)]
    source: SourceArgs,
    /// Keep only the first N characters (0 = none).
    #[arg(long, default_value_t = 0)]
    truncate: usize,
    /// What to do when the source cannot be extracted: abort|summarize
    /// (`summarize` previews the error text, as `summarize` would send it).
    #[arg(long, env = "SUMPIPE_ON_EXTRACT_ERROR", default_value = "abort")]
    on_extract_error: ExtractFailurePolicy,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct SummarizeCmd {
    #[command(flatten)]
    source: SourceArgs,
    /// Keep only the first N characters before chunking (0 = none).
    #[arg(long, default_value_t = 0)]
    truncate: usize,
    /// Model id on the inference API (default: SUMPIPE_MODEL or facebook/bart-large-cnn).
    #[arg(long)]
    model: Option<String>,
    /// Minimum summary length hint, forwarded to the model.
    #[arg(long)]
    min_length: Option<u32>,
    /// Maximum summary length hint, forwarded to the model.
    #[arg(long)]
    max_length: Option<u32>,
    /// Characters per chunk sent to the model (default: SUMPIPE_MAX_CHUNK_CHARS or 4000).
    #[arg(long)]
    max_chunk_chars: Option<usize>,
    /// Chunks summarized at once (default: SUMPIPE_CONCURRENCY or 1).
    #[arg(long)]
    concurrency: Option<usize>,
    /// What to do when the source cannot be extracted: abort|summarize
    #[arg(long, env = "SUMPIPE_ON_EXTRACT_ERROR", default_value = "abort")]
    on_extract_error: ExtractFailurePolicy,
    /// Where to save the summary (`-` = don't save).
    #[arg(long, default_value = "summary.txt")]
    out: String,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ProbeCmd {
    /// Model id to probe (default: SUMPIPE_MODEL or facebook/bart-large-cnn).
    #[arg(long)]
    model: Option<String>,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn wants_json(output: &str) -> bool {
    output.trim().eq_ignore_ascii_case("json")
}

/// Optional env-file loader (opt-in via SUMPIPE_ENV_FILE).
///
/// Sets vars only if not already set in the process environment, and never logs values.
fn load_env_file() {
    let Ok(p) = std::env::var("SUMPIPE_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
///
/// `RUST_LOG` controls the filter (default `warn`); `SUMPIPE_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let json = std::env::var("SUMPIPE_LOG_FORMAT")
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// `pdf-extract` panics on some malformed PDFs; extraction recovers from that, so keep the
/// default hook's message off stderr for those panics only.
fn quiet_pdf_extract_panics() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let from_pdf_extract = info
            .location()
            .is_some_and(|l| l.file().contains("pdf-extract"));
        if from_pdf_extract {
            tracing::debug!(panic = %info, "recovered pdf-extract panic");
            return;
        }
        default_hook(info);
    }));
}

fn extract_json(extracted: &ExtractedText) -> serde_json::Value {
    serde_json::json!({
        "schema_version": 1,
        "kind": "extract",
        "ok": true,
        "engine": extracted.engine,
        "chars": extracted.chars(),
        "warnings": extracted.warnings,
        "preview": preview(&extracted.text, PREVIEW_CHARS),
    })
}

fn summarize_json(report: &SummaryReport, out: Option<&PathBuf>) -> serde_json::Value {
    let chunks: Vec<serde_json::Value> = report
        .chunks
        .iter()
        .map(|c| {
            serde_json::json!({
                "index": c.index,
                "start_char": c.start_char,
                "chars": c.chars,
                "ok": c.outcome.is_ok(),
                "error_kind": c.outcome.error_kind(),
            })
        })
        .collect();
    serde_json::json!({
        "schema_version": 1,
        "kind": "summarize",
        "ok": !report.summary.has_failures(),
        "model": report.model_id,
        "engine": report.extracted.engine,
        "input_chars": report.input_chars,
        "warnings": report.extracted.warnings,
        "chunks": chunks,
        "failed_chunks": report.summary.failed_chunks,
        "summary": report.summary.text,
        "out": out.map(|p| p.display().to_string()),
    })
}

fn error_json(kind: &str, err: &Error) -> serde_json::Value {
    serde_json::json!({
        "schema_version": 1,
        "kind": kind,
        "ok": false,
        "error": err.to_string(),
    })
}

async fn run_extract(args: ExtractCmd) -> Result<ExitCode> {
    let cfg = SumpipeConfig::from_env()?;
    let input = args.source.read()?;
    let pipeline = Pipeline::from_config(&cfg)?;
    let json = wants_json(&args.output);

    let result = match pipeline.extract_input(&input, args.truncate).await {
        Err(e)
            if e.is_extraction_failure()
                && args.on_extract_error == ExtractFailurePolicy::SummarizeAsText =>
        {
            tracing::warn!(error = %e, "extraction failed; previewing the error text");
            Ok(ExtractedText::from_error(&e))
        }
        other => other,
    };

    match result {
        Ok(extracted) => {
            if json {
                println!("{}", extract_json(&extracted));
            } else if !extracted.text.is_empty() {
                println!("{}", preview(&extracted.text, PREVIEW_CHARS));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_extraction_failure() => {
            if json {
                println!("{}", error_json("extract", &e));
            } else {
                eprintln!("{e}");
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_summarize(args: SummarizeCmd) -> Result<ExitCode> {
    let cfg = SumpipeConfig::from_env()?;
    if !cfg.has_token() {
        tracing::warn!("HF_TOKEN is not set; every chunk will report a missing-credential error");
    }
    let input = args.source.read()?;
    let pipeline = Pipeline::from_config(&cfg)?;
    let json = wants_json(&args.output);

    let mut opts = RunOptions::from_config(&cfg);
    opts.truncate = args.truncate;
    opts.on_extract_error = args.on_extract_error;
    opts.params.min_length = args.min_length;
    opts.params.max_length = args.max_length;
    if let Some(m) = args.model {
        opts.model_id = m;
    }
    if let Some(n) = args.max_chunk_chars {
        opts.max_chunk_chars = n;
    }
    if let Some(n) = args.concurrency {
        opts.concurrency = n;
    }

    let report = match pipeline.run(&input, &opts).await {
        Ok(r) => r,
        Err(Error::EmptyInput) => {
            eprintln!("{}", Error::EmptyInput);
            return Ok(ExitCode::from(EXIT_EMPTY_INPUT));
        }
        Err(e) if e.is_extraction_failure() => {
            if json {
                println!("{}", error_json("summarize", &e));
            } else {
                eprintln!("{e}");
            }
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    let out = (args.out.trim() != "-").then(|| PathBuf::from(args.out.trim()));
    if let Some(p) = &out {
        std::fs::write(p, &report.summary.text)
            .map_err(|e| Error::Io(format!("write {}: {e}", p.display())))?;
    }

    if json {
        println!("{}", summarize_json(&report, out.as_ref()));
    } else {
        println!("{}", report.summary.text);
        if report.summary.has_failures() {
            eprintln!(
                "warning: {} of {} chunks failed to summarize; the summary contains error text",
                report.summary.failed_chunks, report.summary.total_chunks
            );
        }
        if let Some(p) = &out {
            eprintln!("saved summary to {}", p.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_probe(args: ProbeCmd) -> Result<ExitCode> {
    let cfg = SumpipeConfig::from_env()?;
    let client = HfInferenceClient::new(&cfg)?;
    let model = args.model.unwrap_or_else(|| cfg.model_id.clone());
    let (status, body) = client.probe(&model).await?;
    println!("{status} {body}");
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    load_env_file();
    init_tracing();
    quiet_pdf_extract_panics();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => run_extract(args).await,
        Commands::Summarize(args) => run_summarize(args).await,
        Commands::Probe(args) => run_probe(args).await,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "sumpipe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("sumpipe {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
