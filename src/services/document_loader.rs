// Document Loader
// Plain text, Markdown, DOCX and PDF files reduced to normalized UTF-8 text

use regex::Regex;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

use crate::services::text_processor::normalize_punctuation;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported document format: .{0}")]
    UnsupportedFormat(String),
    #[error("invalid docx: {0}")]
    Docx(String),
    #[error("pdf extraction failed: {0}")]
    Pdf(String),
    #[error("document contains no text")]
    Empty,
}

static DOCX_RUN_RE: OnceLock<Regex> = OnceLock::new();

fn docx_run_re() -> &'static Regex {
    DOCX_RUN_RE.get_or_init(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").expect("docx run regex"))
}

/// Load a file and return its normalized text.
pub fn load_document(path: &Path) -> Result<String, DocumentError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let raw = match ext.as_str() {
        "" | "txt" | "md" | "markdown" => fs::read_to_string(path)?,
        "docx" => extract_docx_text(&fs::read(path)?)?,
        "pdf" => extract_pdf_text(&fs::read(path)?)?,
        other => return Err(DocumentError::UnsupportedFormat(other.to_string())),
    };

    let text = normalize_punctuation(&raw);
    if text.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    debug!(path = %path.display(), format = %ext, chars = text.chars().count(), "document.loaded");
    Ok(text)
}

/// Text of `word/document.xml`, one line per paragraph.
pub fn extract_docx_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| DocumentError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| DocumentError::Docx(e.to_string()))?
        .read_to_string(&mut xml)?;

    let paragraphs: Vec<String> = xml
        .split("</w:p>")
        .map(|para| {
            docx_run_re()
                .captures_iter(para)
                .map(|cap| unescape_xml(&cap[1]))
                .collect::<String>()
        })
        .filter(|p| !p.trim().is_empty())
        .collect();

    Ok(paragraphs.join("\n"))
}

pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, DocumentError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| DocumentError::Pdf(e.to_string()))
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_docx(path: &Path, document_xml: &str) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_load_plain_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("essay.txt");
        fs::write(&path, "An essay about rivers.\nSecond line.").unwrap();
        let text = load_document(&path).unwrap();
        assert!(text.contains("An essay about rivers."));
        assert!(text.contains("Second line."));
    }

    #[test]
    fn test_load_docx_paragraphs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("essay.docx");
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Rivers shape</w:t></w:r><w:r><w:t xml:space="preserve"> valleys &amp; plains.</w:t></w:r></w:p>
            <w:p><w:r><w:t>They carry silt.</w:t></w:r></w:p>
            <w:p></w:p>
        </w:body></w:document>"#;
        write_docx(&path, xml);

        let text = load_document(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Rivers shape valleys & plains.");
        assert_eq!(lines[1], "They carry silt.");
    }

    #[test]
    fn test_docx_without_document_xml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.docx");
        let file = fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("other.xml", zip::write::SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<x/>").unwrap();
        zip.finish().unwrap();

        assert!(matches!(load_document(&path), Err(DocumentError::Docx(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("slides.pptx");
        fs::write(&path, b"binary").unwrap();
        assert!(matches!(
            load_document(&path),
            Err(DocumentError::UnsupportedFormat(ext)) if ext == "pptx"
        ));
    }

    #[test]
    fn test_empty_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.md");
        fs::write(&path, "  \n\n ").unwrap();
        assert!(matches!(load_document(&path), Err(DocumentError::Empty)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_document(&dir.path().join("nope.txt")),
            Err(DocumentError::Io(_))
        ));
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &lt;b&gt; &amp;amp; &quot;c&quot;"), "a <b> &amp; \"c\"");
    }
}
