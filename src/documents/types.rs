use crate::extraction::ExtractionStatus;
use crate::llm::RemoteServiceError;
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;
use time::OffsetDateTime;

/// Summary stored when the text gate declines to call the provider.
pub const SKIPPED_SUMMARY: &str = "Not enough text or unsupported file type for AI summarization.";

/// Summary stored when extraction or the provider failed during ingestion.
pub fn failed_summary(reason: impl Display) -> String {
    format!("AI processing failed: {reason}")
}

/// How the stored summary of a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    /// The provider produced the summary.
    Generated,
    /// The text gate skipped the provider; the summary is [`SKIPPED_SUMMARY`].
    Skipped,
    /// Extraction or the provider failed; the summary explains why.
    Failed,
}

impl SummaryStatus {
    /// Stable lowercase name used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Inverse of [`SummaryStatus::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "generated" => Some(Self::Generated),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One uploaded document with its extracted text and summary.
///
/// Records are immutable after creation; `extracted_text` and `summary` always hold a value,
/// sentinel text included, and the accompanying status tags say which.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Opaque identifier assigned at creation.
    pub id: String,
    /// Account that uploaded the document; the only one allowed to access it.
    pub owner_id: String,
    /// Client-supplied file name, for display only.
    pub file_name: String,
    /// Blob store key of the raw bytes.
    pub storage_location: String,
    /// Declared MIME type accepted at upload.
    pub media_type: String,
    /// Length of the raw bytes.
    pub size_bytes: u64,
    /// Extracted plain text or sentinel.
    pub extracted_text: String,
    /// Origin of `extracted_text`.
    pub text_status: ExtractionStatus,
    /// Summary text or sentinel.
    pub summary: String,
    /// Origin of `summary`.
    pub summary_status: SummaryStatus,
    /// Creation time.
    pub created_at: OffsetDateTime,
    /// Last modification time; equal to `created_at` since records are never updated.
    pub updated_at: OffsetDateTime,
}

impl DocumentRecord {
    /// Whether the stored text is real extracted content longer than `min_chars` characters.
    pub fn has_answerable_text(&self, min_chars: usize) -> bool {
        self.text_status == ExtractionStatus::Extracted
            && self.extracted_text.chars().count() > min_chars
    }
}

/// A file received at the upload boundary, not yet validated.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name.
    pub file_name: String,
    /// Client-declared MIME type.
    pub media_type: String,
    /// Raw contents.
    pub bytes: Vec<u8>,
}

/// Failures of document operations, classified for the caller.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Bad or missing input; nothing was persisted.
    #[error("{0}")]
    Validation(String),
    /// The caller does not own the document.
    #[error("Not authorized to access this document")]
    Authorization,
    /// No document has the requested id.
    #[error("Document not found")]
    NotFound,
    /// The language-model provider failed during a foreground call.
    #[error("Failed to get answer from AI: {0}")]
    RemoteService(#[from] RemoteServiceError),
    /// A storage backend failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl DocumentError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
