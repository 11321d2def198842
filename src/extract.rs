//! Multi-format text extraction.
//!
//! Turns the raw bytes of a [`Document`] into plain UTF-8 text, one handler
//! per [`DocumentFormat`]. Extraction never fails: it returns an
//! [`Extraction`] whose [`ExtractStatus`] says whether the text came from
//! the format's normal path, from a degraded fallback, or is a sentinel
//! standing in for a document that could not be read at all. One bad
//! document therefore never aborts a multi-document ingestion.
//!
//! | Format | Handling | On failure |
//! |--------|----------|------------|
//! | plain text, markdown | lossy UTF-8 decode | n/a |
//! | markup (HTML) | visible text nodes joined by `\n` | n/a |
//! | structured data (JSON) | pretty-printed, key order preserved | `Fallback`, raw lossy text |
//! | portable document (PDF) | text page by page | `Failed`, sentinel text |
//! | unknown | lossy UTF-8 decode | `Fallback`, empty text if binary |

use docbase_core::models::{Document, DocumentFormat};
use scraper::{Html, Node};
use thiserror::Error;

/// Prefix of the text returned for a PDF that could not be parsed.
pub const PDF_ERROR_SENTINEL: &str = "[ERROR PARSING PDF]";

/// Elements whose text content is never rendered.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Share of U+FFFD characters above which decoded bytes are treated as binary.
const MAX_REPLACEMENT_RATIO: f64 = 0.10;

/// Why extraction degraded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("content is not text")]
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractStatus {
    /// The format's normal path produced the text.
    Complete,
    /// A fallback path produced usable (possibly empty) text.
    Fallback(ExtractError),
    /// Nothing usable; the text is a sentinel describing the failure.
    Failed(ExtractError),
}

/// Result of extracting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub status: ExtractStatus,
}

impl Extraction {
    fn complete(text: String) -> Self {
        Self {
            text,
            status: ExtractStatus::Complete,
        }
    }

    fn fallback(text: String, reason: ExtractError) -> Self {
        Self {
            text,
            status: ExtractStatus::Fallback(reason),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ExtractStatus::Failed(_))
    }

    /// The degradation reason, if any.
    pub fn reason(&self) -> Option<&ExtractError> {
        match &self.status {
            ExtractStatus::Complete => None,
            ExtractStatus::Fallback(e) | ExtractStatus::Failed(e) => Some(e),
        }
    }
}

/// Extract text from a document using its declared format.
pub fn extract_document(doc: &Document) -> Extraction {
    extract(&doc.bytes, doc.format)
}

/// Extract text from raw bytes of the given format.
pub fn extract(bytes: &[u8], format: DocumentFormat) -> Extraction {
    match format {
        DocumentFormat::PlainText | DocumentFormat::Markdown => {
            Extraction::complete(decode_lossy(bytes))
        }
        DocumentFormat::Markup => Extraction::complete(extract_markup(bytes)),
        DocumentFormat::StructuredData => extract_json(bytes),
        DocumentFormat::PortableDocument => extract_pdf(bytes),
        DocumentFormat::Unknown => extract_unknown(bytes),
    }
}

/// UTF-8 decode replacing invalid sequences; a leading BOM is dropped.
fn decode_lossy(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

fn extract_markup(bytes: &[u8]) -> String {
    let source = decode_lossy(bytes);
    let html = Html::parse_document(&source);
    let mut lines = Vec::new();
    for node in html.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            matches!(a.value(), Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    lines.join("\n")
}

fn extract_json(bytes: &[u8]) -> Extraction {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let parsed = serde_json::from_slice::<serde_json::Value>(body)
        .and_then(|value| serde_json::to_string_pretty(&value));
    match parsed {
        Ok(pretty) => Extraction::complete(pretty),
        Err(e) => Extraction::fallback(decode_lossy(bytes), ExtractError::Json(e.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Extraction {
    // pdf-extract panics on some malformed inputs instead of returning Err.
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes));
    let reason = match result {
        Ok(Ok(pages)) => return Extraction::complete(pages.join("\n")),
        Ok(Err(e)) => e.to_string(),
        Err(_) => "parser panicked on malformed input".to_string(),
    };
    Extraction {
        text: format!("{} {}", PDF_ERROR_SENTINEL, reason),
        status: ExtractStatus::Failed(ExtractError::Pdf(reason)),
    }
}

fn extract_unknown(bytes: &[u8]) -> Extraction {
    let text = decode_lossy(bytes);
    if looks_like_text(&text) {
        Extraction::complete(text)
    } else {
        Extraction::fallback(String::new(), ExtractError::Binary)
    }
}

/// Heuristic: no NUL characters and few replacement characters.
fn looks_like_text(text: &str) -> bool {
    if text.contains('\0') {
        return false;
    }
    let total = text.chars().count();
    if total == 0 {
        return true;
    }
    let replaced = text.chars().filter(|&c| c == char::REPLACEMENT_CHARACTER).count();
    (replaced as f64 / total as f64) <= MAX_REPLACEMENT_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_lossy_decode() {
        let out = extract(b"caf\xff ok", DocumentFormat::PlainText);
        assert_eq!(out.status, ExtractStatus::Complete);
        assert_eq!(out.text, "caf\u{FFFD} ok");
    }

    #[test]
    fn test_markdown_passthrough_and_bom() {
        let out = extract(b"\xEF\xBB\xBF# Title\n\nBody", DocumentFormat::Markdown);
        assert_eq!(out.text, "# Title\n\nBody");
    }

    #[test]
    fn test_markup_visible_text_only() {
        let html = br#"<html><head><title>Shop</title><style>p { color: red; }</style>
            <script>var secret = 1;</script></head>
            <body><h1>Checkout</h1><p>Pay <b>now</b></p><noscript>enable js</noscript></body></html>"#;
        let out = extract(html, DocumentFormat::Markup);
        assert_eq!(out.status, ExtractStatus::Complete);
        assert_eq!(out.text, "Shop\nCheckout\nPay\nnow");
        assert!(!out.text.contains("secret"));
        assert!(!out.text.contains("color"));
    }

    #[test]
    fn test_json_pretty_printed_in_source_order() {
        let out = extract(br#"{"zeta":1,"alpha":[true,null]}"#, DocumentFormat::StructuredData);
        assert_eq!(out.status, ExtractStatus::Complete);
        assert_eq!(
            out.text,
            "{\n  \"zeta\": 1,\n  \"alpha\": [\n    true,\n    null\n  ]\n}"
        );
    }

    #[test]
    fn test_invalid_json_falls_back_to_raw_text() {
        let out = extract(b"{not json", DocumentFormat::StructuredData);
        assert_eq!(out.text, "{not json");
        assert!(matches!(out.status, ExtractStatus::Fallback(ExtractError::Json(_))));
        assert!(!out.is_failed());
    }

    #[test]
    fn test_invalid_pdf_returns_sentinel() {
        let out = extract(b"not a pdf", DocumentFormat::PortableDocument);
        assert!(out.is_failed());
        assert!(out.text.starts_with(PDF_ERROR_SENTINEL));
        assert!(matches!(out.reason(), Some(ExtractError::Pdf(_))));
    }

    #[test]
    fn test_unknown_text_is_decoded() {
        let out = extract(b"id,name\n1,widget\n", DocumentFormat::Unknown);
        assert_eq!(out.status, ExtractStatus::Complete);
        assert_eq!(out.text, "id,name\n1,widget\n");
    }

    #[test]
    fn test_unknown_binary_is_empty() {
        let out = extract(&[0x00, 0x01, 0xff, 0xfe, 0x00], DocumentFormat::Unknown);
        assert_eq!(out.text, "");
        assert_eq!(out.status, ExtractStatus::Fallback(ExtractError::Binary));
    }

    #[test]
    fn test_empty_inputs_never_fail() {
        for format in [
            DocumentFormat::PlainText,
            DocumentFormat::Markdown,
            DocumentFormat::Markup,
            DocumentFormat::Unknown,
        ] {
            let out = extract(b"", format);
            assert_eq!(out.text, "");
            assert!(!out.is_failed());
        }
    }

    #[test]
    fn test_extract_document_uses_declared_format() {
        let doc = Document::new("page.htm", b"<p>hi</p>".to_vec());
        assert_eq!(extract_document(&doc).text, "hi");
    }
}
