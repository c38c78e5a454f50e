//! Format-dispatched plain-text extraction for uploaded documents.
//!
//! Every accepted upload maps to exactly one [`MediaKind`]; [`TextExtractor::extract`] matches on
//! it exhaustively, so supporting a new format means adding a variant and one match arm.
//! Parsing runs on the blocking pool; a parser panic on a corrupted file surfaces as
//! [`ExtractError::Worker`] instead of taking the request down.

mod ocr;
mod ooxml;

use crate::config::OcrConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub use ocr::OcrEngine;

/// Text stored for formats that are accepted but have no extractor.
pub const UNSUPPORTED_TEXT: &str = "Unsupported file type for direct AI processing.";

/// MIME type of Word 2007+ documents.
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Closed set of media classes accepted at the upload boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Legacy binary Word document; stored but not extracted.
    Doc,
    /// UTF-8 plain text.
    PlainText,
    /// JPEG image, read through OCR.
    Jpeg,
    /// PNG image, read through OCR.
    Png,
}

impl MediaKind {
    /// Every supported kind, in display order.
    pub const ALL: [MediaKind; 6] = [
        MediaKind::Jpeg,
        MediaKind::Png,
        MediaKind::Pdf,
        MediaKind::Doc,
        MediaKind::Docx,
        MediaKind::PlainText,
    ];

    /// Resolve a declared MIME type, ignoring parameters such as `; charset=utf-8`.
    pub fn from_mime(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            MIME_DOCX => Some(Self::Docx),
            "application/msword" => Some(Self::Doc),
            "text/plain" => Some(Self::PlainText),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Resolve a file extension (with or without the leading dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "txt" | "text" => Some(Self::PlainText),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Resolve the extension of a client-supplied file name.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical MIME type.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => MIME_DOCX,
            Self::Doc => "application/msword",
            Self::PlainText => "text/plain",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Extension used when naming stored bytes.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::PlainText => "txt",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Whether the kind is read through optical character recognition.
    pub fn is_image(self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// How the stored text of a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// The extractor produced the text (possibly empty).
    Extracted,
    /// No extractor exists; the text is [`UNSUPPORTED_TEXT`].
    Unsupported,
    /// The extractor failed; the text holds whatever was recovered.
    Failed,
}

impl ExtractionStatus {
    /// Stable lowercase name used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::Unsupported => "unsupported",
            Self::Failed => "failed",
        }
    }

    /// Inverse of [`ExtractionStatus::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "extracted" => Some(Self::Extracted),
            "unsupported" => Some(Self::Unsupported),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Plain text produced for one upload, tagged with how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Extracted or sentinel text.
    pub text: String,
    /// Origin of [`Extraction::text`].
    pub status: ExtractionStatus,
}

impl Extraction {
    fn extracted(text: String) -> Self {
        Self {
            text,
            status: ExtractionStatus::Extracted,
        }
    }

    fn unsupported() -> Self {
        Self {
            text: UNSUPPORTED_TEXT.to_string(),
            status: ExtractionStatus::Unsupported,
        }
    }
}

/// Extraction failure for a file of a known kind.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The PDF could not be parsed.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    /// The DOCX archive or its XML was malformed.
    #[error("DOCX extraction failed: {0}")]
    Ooxml(String),
    /// The OCR engine failed, timed out, or could not be launched.
    #[error("OCR failed: {0}")]
    Ocr(String),
    /// The parser task panicked or was cancelled.
    #[error("extraction worker failed: {0}")]
    Worker(String),
}

impl ExtractError {
    /// Short description of the failure that is safe to show the document's owner.
    ///
    /// Variant payloads may hold engine output and temporary paths and only go to the logs.
    pub fn public_reason(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "could not read text from the PDF",
            Self::Ooxml(_) => "could not read text from the DOCX file",
            Self::Ocr(_) => "could not read text from the image",
            Self::Worker(_) => "text extraction was interrupted",
        }
    }
}

/// Stateless, format-dispatched text extractor.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    ocr: OcrEngine,
}

impl TextExtractor {
    /// Build an extractor that shells out to the configured OCR engine for images.
    pub fn new(ocr: &OcrConfig) -> Self {
        Self {
            ocr: OcrEngine::new(ocr),
        }
    }

    /// Extract plain text from bytes of the given kind.
    ///
    /// Returns best-effort text (possibly empty) for well-formed input. Kinds without an
    /// extractor yield [`UNSUPPORTED_TEXT`] tagged [`ExtractionStatus::Unsupported`].
    pub async fn extract(&self, bytes: &[u8], kind: MediaKind) -> Result<Extraction, ExtractError> {
        let text = match kind {
            MediaKind::PlainText => String::from_utf8_lossy(bytes).into_owned(),
            MediaKind::Pdf => run_blocking(bytes.to_vec(), extract_pdf).await?,
            MediaKind::Docx => run_blocking(bytes.to_vec(), ooxml::extract_docx).await?,
            MediaKind::Jpeg | MediaKind::Png => self.ocr.recognize(bytes, kind.extension()).await?,
            MediaKind::Doc => return Ok(Extraction::unsupported()),
        };
        tracing::debug!(
            media_kind = %kind,
            chars = text.chars().count(),
            "Extracted document text"
        );
        Ok(Extraction::extracted(text))
    }
}

async fn run_blocking(
    bytes: Vec<u8>,
    parse: fn(&[u8]) -> Result<String, ExtractError>,
) -> Result<String, ExtractError> {
    tokio::task::spawn_blocking(move || parse(&bytes))
        .await
        .map_err(|err| ExtractError::Worker(err.to_string()))?
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|err| ExtractError::Pdf(err.to_string()))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Write;

    /// Single-page PDF drawing `phrase` with a built-in font.
    pub(crate) fn pdf_with_text(phrase: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 72 700 Td ({phrase}) Tj ET");
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
            format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_start}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        out
    }

    /// DOCX archive whose body holds one paragraph per entry of `paragraphs`.
    pub(crate) fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|text| format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
        );

        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .expect("start docx entry");
            zip.write_all(xml.as_bytes()).expect("write docx xml");
            zip.finish().expect("finish docx");
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> TextExtractor {
        TextExtractor::new(&OcrConfig::default())
    }

    #[test]
    fn mime_and_extension_lookups_agree() {
        for kind in MediaKind::ALL {
            assert_eq!(MediaKind::from_mime(kind.mime()), Some(kind));
            assert_eq!(MediaKind::from_extension(kind.extension()), Some(kind));
        }
        assert_eq!(
            MediaKind::from_mime("Text/Plain; charset=utf-8"),
            Some(MediaKind::PlainText)
        );
        assert_eq!(MediaKind::from_mime("image/jpg"), Some(MediaKind::Jpeg));
        assert_eq!(MediaKind::from_mime("application/zip"), None);
        assert_eq!(MediaKind::from_file_name("Scan.JPEG"), Some(MediaKind::Jpeg));
        assert_eq!(MediaKind::from_file_name("archive.tar.gz"), None);
        assert_eq!(MediaKind::from_file_name("README"), None);
        assert!(MediaKind::Png.is_image() && MediaKind::Jpeg.is_image());
        assert!(!MediaKind::Pdf.is_image());
    }

    #[test]
    fn extraction_status_names_round_trip() {
        for status in [
            ExtractionStatus::Extracted,
            ExtractionStatus::Unsupported,
            ExtractionStatus::Failed,
        ] {
            assert_eq!(ExtractionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ExtractionStatus::parse("pending"), None);
    }

    #[tokio::test]
    async fn plain_text_is_decoded_directly() {
        let extraction = extractor()
            .extract(b"hello", MediaKind::PlainText)
            .await
            .expect("text");
        assert_eq!(extraction.text, "hello");
        assert_eq!(extraction.status, ExtractionStatus::Extracted);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_rejected() {
        let extraction = extractor()
            .extract(&[b'o', b'k', 0xff], MediaKind::PlainText)
            .await
            .expect("lossy text");
        assert!(extraction.text.starts_with("ok"));
    }

    #[tokio::test]
    async fn empty_text_file_yields_empty_string() {
        let extraction = extractor()
            .extract(b"", MediaKind::PlainText)
            .await
            .expect("empty text");
        assert_eq!(extraction.text, "");
        assert_eq!(extraction.status, ExtractionStatus::Extracted);
    }

    #[tokio::test]
    async fn legacy_word_documents_are_unsupported() {
        let extraction = extractor()
            .extract(b"\xd0\xcf\x11\xe0", MediaKind::Doc)
            .await
            .expect("sentinel");
        assert_eq!(extraction.text, UNSUPPORTED_TEXT);
        assert_eq!(extraction.status, ExtractionStatus::Unsupported);
    }

    #[tokio::test]
    async fn pdf_text_is_extracted() {
        let pdf = fixtures::pdf_with_text("quarterly revenue grew");
        let extraction = extractor()
            .extract(&pdf, MediaKind::Pdf)
            .await
            .expect("pdf text");
        assert!(extraction.text.contains("quarterly revenue grew"));
    }

    #[tokio::test]
    async fn corrupted_pdf_reports_failure() {
        let error = extractor()
            .extract(b"not a pdf at all", MediaKind::Pdf)
            .await
            .expect_err("corrupted pdf");
        assert!(matches!(error, ExtractError::Pdf(_) | ExtractError::Worker(_)));
    }

    #[tokio::test]
    async fn docx_paragraphs_are_extracted() {
        let docx = fixtures::docx_with_paragraphs(&["First paragraph.", "Second one."]);
        let extraction = extractor()
            .extract(&docx, MediaKind::Docx)
            .await
            .expect("docx text");
        assert_eq!(extraction.text, "First paragraph.\nSecond one.");
    }

    #[tokio::test]
    async fn corrupted_docx_reports_failure() {
        let error = extractor()
            .extract(b"not a zip", MediaKind::Docx)
            .await
            .expect_err("corrupted docx");
        assert!(matches!(error, ExtractError::Ooxml(_)));
        assert_eq!(error.public_reason(), "could not read text from the DOCX file");
    }
}
