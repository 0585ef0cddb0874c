use assert_cmd::Command;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use predicates::prelude::*;

fn sumpipe() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sumpipe"));
    // Keep contracts hermetic: no env-file autoload, no inherited credentials.
    cmd.env_remove("SUMPIPE_ENV_FILE")
        .env_remove("HF_TOKEN")
        .env_remove("SUMPIPE_ON_EXTRACT_ERROR")
        .env_remove("SUMPIPE_MODEL")
        .env_remove("SUMPIPE_MAX_CHUNK_CHARS")
        .env_remove("SUMPIPE_CONCURRENCY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn a_source_is_required() {
    sumpipe()
        .args(["summarize", "--out", "-"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url"));
}

#[test]
fn sources_are_mutually_exclusive() {
    sumpipe()
        .args(["summarize", "--text", "a", "--url", "http://127.0.0.1:9/", "--out", "-"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn blank_text_exits_2_without_output() {
    sumpipe()
        .args(["summarize", "--text", "   \n ", "--out", "-"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "No input text found. Please provide a URL, text, or PDF.",
        ));
}

#[test]
fn blank_text_does_not_write_the_summary_file() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("summary.txt");
    sumpipe()
        .args(["summarize", "--text", ""])
        .arg("--out")
        .arg(&out)
        .assert()
        .code(2);
    assert!(!out.exists());
}

#[test]
fn missing_token_repeats_the_credential_error_per_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("summary.txt");
    let text = "b".repeat(5000);
    let assert = sumpipe()
        .args(["summarize", "--text", &text])
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("2 of 2 chunks failed"))
        .stderr(predicate::str::contains("HF_TOKEN is not set"));

    let msg = "Error: Hugging Face token not found in environment variable HF_TOKEN";
    let expected = format!("{msg}\n\n{msg}");
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert_eq!(stdout.trim_end_matches('\n'), expected);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), expected);
}

#[test]
fn extract_prints_a_capped_preview() {
    let text = "c".repeat(6000);
    let assert = sumpipe()
        .args(["extract", "--text", &text])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let preview = stdout.trim_end_matches('\n');
    assert_eq!(preview.chars().count(), 5003);
    assert!(preview.ends_with("..."));
}

#[test]
fn extract_reads_text_from_stdin() {
    sumpipe()
        .args(["extract", "--text-file", "-", "--output", "json"])
        .write_stdin("short note")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""preview":"short note""#))
        .stdout(predicate::str::contains(r#""engine":"paste""#));
}

#[test]
fn unreadable_pdf_fails_extraction() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = tmp.path().join("broken.pdf");
    std::fs::write(&pdf, b"not really a pdf").unwrap();
    sumpipe()
        .args(["summarize", "--out", "-", "--output", "json"])
        .arg("--pdf")
        .arg(&pdf)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""ok":false"#))
        .stdout(predicate::str::contains("PDF extraction failed"));
}

#[test]
fn probe_without_token_fails() {
    sumpipe()
        .args(["probe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HF_TOKEN"));
}

/// Three pages; the middle one sets a font with a non-name operand, which pdf-extract
/// panics on.
fn pdf_with_broken_middle_page() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let font: Object = "F1".into();
    let pages = [(font.clone(), "Alpha"), (24.into(), "Bravo"), (font, "Charlie")];

    let mut kids: Vec<Object> = Vec::new();
    for (font, text) in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![font, 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

#[test]
fn recovered_pdf_extract_panic_stays_off_stderr() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = tmp.path().join("broken-page.pdf");
    std::fs::write(&pdf, pdf_with_broken_middle_page()).unwrap();

    sumpipe()
        .args(["extract", "--output", "json"])
        .arg("--pdf")
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""engine":"pdf-pages""#))
        .stdout(predicate::str::contains("Alpha"))
        .stdout(predicate::str::contains("Charlie"))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn extract_aborts_on_fetch_failure_by_default() {
    sumpipe()
        .args(["extract", "--url", "not a url"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("ERROR fetching URL: "));
}

#[test]
fn extract_can_preview_the_error_text() {
    sumpipe()
        .args(["extract", "--url", "not a url", "--on-extract-error", "summarize"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ERROR fetching URL: "));
}
