use sumpipe_core::{Error, ExtractedText, Result};
use tracing::debug;

fn selector(s: &str) -> Option<html_scraper::Selector> {
    html_scraper::Selector::parse(s).ok()
}

/// Text of one paragraph: every descendant text node trimmed, blanks dropped, the rest
/// concatenated without a separator.
fn paragraph_text(el: &html_scraper::ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .concat()
}

fn join_paragraphs<'a>(ps: impl Iterator<Item = html_scraper::ElementRef<'a>>) -> (String, usize) {
    let mut n = 0usize;
    let text = ps
        .map(|p| {
            n += 1;
            paragraph_text(&p)
        })
        .collect::<Vec<_>>()
        .join(" ");
    (text, n)
}

/// Paragraph text of an HTML page.
///
/// Uses the `<p>` elements of the first `<article>` when the page has one, otherwise every
/// `<p>` in the document. Paragraphs are joined with single spaces.
pub fn html_to_paragraph_text(html: &str) -> ExtractedText {
    let doc = html_scraper::Html::parse_document(html);
    let (Some(article_sel), Some(p_sel)) = (selector("article"), selector("p")) else {
        return ExtractedText::new("html-paragraphs", String::new());
    };

    let (engine, text, n, mut warnings) = match doc.select(&article_sel).next() {
        Some(article) => {
            let (text, n) = join_paragraphs(article.select(&p_sel));
            ("html-article", text, n, Vec::new())
        }
        None => {
            let (text, n) = join_paragraphs(doc.select(&p_sel));
            ("html-paragraphs", text, n, vec!["html_no_article"])
        }
    };
    if n == 0 {
        warnings.push("html_no_paragraphs");
    }
    debug!(engine, paragraphs = n, chars = text.chars().count(), "html extracted");

    ExtractedText {
        engine,
        text,
        warnings,
    }
}

/// Extract text from a PDF body (in-memory bytes), one page at a time.
///
/// Pages are joined with `\n`. A page without extractable text contributes an empty string;
/// only a document that cannot be parsed at all is an error.
///
/// Panics inside `pdf-extract` are caught, but the process panic hook still sees them; the
/// `sumpipe` binary installs a hook that keeps those off stderr.
pub fn pdf_to_text(bytes: &[u8]) -> Result<ExtractedText> {
    // `pdf-extract` can panic on malformed input; treat that like an extraction failure and
    // fall back to the page-wise path.
    let primary = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    match primary {
        Ok(Ok(pages)) => {
            let mut out = ExtractedText::new("pdf-extract", pages.join("\n"));
            if !out.text.chars().any(|c| !c.is_whitespace()) {
                out.warnings.push("pdf_no_text");
            }
            debug!(pages = pages.len(), chars = out.chars(), "pdf extracted");
            Ok(out)
        }
        Ok(Err(e)) => {
            debug!(error = %e, "pdf-extract failed; falling back to page-wise extraction");
            pdf_to_text_by_page(bytes)
        }
        Err(_) => {
            debug!("pdf-extract panicked; falling back to page-wise extraction");
            pdf_to_text_by_page(bytes)
        }
    }
}

fn pdf_to_text_by_page(bytes: &[u8]) -> Result<ExtractedText> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| Error::Pdf(e.to_string()))?;

    let mut warnings = vec!["pdf_extract_failed"];
    let mut pages = Vec::new();
    // get_pages() is keyed by 1-based page number, so iteration is in page order.
    for page_no in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_no]) {
            Ok(t) => pages.push(t),
            Err(e) => {
                debug!(page = page_no, error = %e, "page has no extractable text");
                if !warnings.contains(&"pdf_page_unextractable") {
                    warnings.push("pdf_page_unextractable");
                }
                pages.push(String::new());
            }
        }
    }

    let text = pages.join("\n");
    if !text.chars().any(|c| !c.is_whitespace()) {
        warnings.push("pdf_no_text");
    }
    Ok(ExtractedText {
        engine: "pdf-pages",
        text,
        warnings,
    })
}

/// Best-effort sniff for PDF bytes (magic header).
pub fn bytes_look_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Content ops that draw `text` in font resource `font`.
    pub(crate) fn text_ops(font: &str, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    /// Build a PDF with one page per entry. `None` leaves the page without `Contents`.
    /// Only font `F1` (Courier) is defined.
    pub(crate) fn pdf_from_contents(pages: Vec<Option<Vec<Operation>>>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            };
            if let Some(operations) = operations {
                let content = Content { operations };
                let content_id =
                    doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
                page.set("Contents", content_id);
            }
            kids.push(doc.add_object(page).into());
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

    /// Build a small PDF with one text-bearing page per entry in `pages`.
    pub(crate) fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        pdf_from_contents(pages.iter().map(|t| Some(text_ops("F1", t))).collect())
    }

    #[test]
    fn prefers_paragraphs_inside_first_article() {
        let html = r#"
        <html><body>
          <p>Outside intro.</p>
          <article><h1>Title</h1><p>Hello world.</p><p>More text here.</p></article>
          <article><p>Second article.</p></article>
        </body></html>
        "#;
        let out = html_to_paragraph_text(html);
        assert_eq!(out.engine, "html-article");
        assert_eq!(out.text, "Hello world. More text here.");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn falls_back_to_all_paragraphs_without_article() {
        let html = "<html><body><div><p>One.</p></div><p>Two.</p></body></html>";
        let out = html_to_paragraph_text(html);
        assert_eq!(out.engine, "html-paragraphs");
        assert_eq!(out.text, "One. Two.");
        assert_eq!(out.warnings, vec!["html_no_article"]);
    }

    #[test]
    fn paragraph_text_nodes_are_stripped_and_concatenated() {
        let html = "<article><p>  Hello <b> big </b> world  </p><p></p><p>end</p></article>";
        let out = html_to_paragraph_text(html);
        // Empty paragraphs still take part in the space join.
        assert_eq!(out.text, "Hellobigworld  end");
    }

    #[test]
    fn page_without_paragraphs_is_empty_with_warning() {
        let out = html_to_paragraph_text("<html><body><div>no paragraphs</div></body></html>");
        assert_eq!(out.text, "");
        assert!(out.warnings.contains(&"html_no_paragraphs"));
    }

    #[test]
    fn bytes_look_like_pdf_sniffs_magic_header() {
        assert!(bytes_look_like_pdf(b"%PDF-1.7\n%..."));
        assert!(!bytes_look_like_pdf(b"<!doctype html><html>"));
        assert!(!bytes_look_like_pdf(b""));
    }

    #[test]
    fn pdf_pages_come_out_in_order() {
        let bytes = pdf_with_pages(&["Alpha", "Bravo"]);
        let out = pdf_to_text(&bytes).unwrap();
        let a = out.text.find("Alpha").expect("first page text");
        let b = out.text.find("Bravo").expect("second page text");
        assert!(a < b);
        assert!(out.text.contains('\n'));
    }

    #[test]
    fn garbage_bytes_are_a_pdf_error() {
        let err = pdf_to_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, Error::Pdf(_)), "got {err:?}");
    }

    #[test]
    fn undefined_font_falls_back_to_page_wise_extraction() {
        let bytes = pdf_from_contents(vec![
            Some(text_ops("F1", "Alpha")),
            Some(text_ops("F9", "Bravo")),
            Some(text_ops("F1", "Charlie")),
        ]);
        let out = pdf_to_text(&bytes).unwrap();
        assert_eq!(out.engine, "pdf-pages");
        assert!(out.warnings.contains(&"pdf_extract_failed"));
        let a = out.text.find("Alpha").expect("first page text");
        let c = out.text.find("Charlie").expect("last page text");
        assert!(a < c);
        // No encoding for F9, so the middle page yields no text.
        assert!(!out.text.contains("Bravo"));
    }

    #[test]
    fn unextractable_page_contributes_an_empty_string() {
        // `Tf` whose operand is not a font name: pdf-extract panics on it and lopdf rejects
        // the page, while the pages around it still extract.
        let broken = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![24.into()]),
            Operation::new("Tj", vec![Object::string_literal("Bravo")]),
            Operation::new("ET", vec![]),
        ];
        let bytes = pdf_from_contents(vec![
            Some(text_ops("F1", "Alpha")),
            Some(broken),
            Some(text_ops("F1", "Charlie")),
        ]);
        let out = pdf_to_text(&bytes).unwrap();
        assert_eq!(out.engine, "pdf-pages");
        assert_eq!(
            out.warnings,
            vec!["pdf_extract_failed", "pdf_page_unextractable"]
        );
        let pages: Vec<&str> = out.text.split('\n').filter(|p| !p.is_empty()).collect();
        assert_eq!(pages, vec!["Alpha", "Charlie"]);
        assert!(!out.text.contains("Bravo"));
    }

    #[test]
    fn page_without_contents_keeps_neighbours_in_order() {
        let bytes = pdf_from_contents(vec![
            Some(text_ops("F1", "Alpha")),
            None,
            Some(text_ops("F1", "Charlie")),
        ]);
        let out = pdf_to_text(&bytes).unwrap();
        assert!(out.engine.starts_with("pdf"));
        let a = out.text.find("Alpha").expect("first page text");
        let c = out.text.find("Charlie").expect("last page text");
        assert!(a < c);
        assert!(!out.warnings.contains(&"pdf_no_text"));
    }
}
