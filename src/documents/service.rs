use super::types::{
    DocumentError, DocumentRecord, SKIPPED_SUMMARY, SummaryStatus, UploadedFile, failed_summary,
};
use super::validation::validate_upload;
use crate::config::{AiPolicy, UploadConfig};
use crate::extraction::{ExtractionStatus, MediaKind, TextExtractor};
use crate::llm::assistant::truncate_chars;
use crate::llm::{ChatCompletion, QuestionAnsweringClient, SummarizationClient};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::storage::{BlobStore, DocumentStore, timestamp_now};
use async_trait::async_trait;
use std::sync::Arc;

const MISSING_QUESTION: &str = "Please provide a question.";
const NOT_ENOUGH_TEXT: &str = "Document does not contain enough extracted text for Q&A.";

/// Document operations exposed to the HTTP layer.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Validate, store, extract, summarize, and persist an upload.
    async fn ingest(&self, owner_id: &str, file: UploadedFile)
    -> Result<DocumentRecord, DocumentError>;
    /// Every document owned by `owner_id`, newest first.
    async fn list(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, DocumentError>;
    /// One document, if `owner_id` owns it.
    async fn get(&self, owner_id: &str, id: &str) -> Result<DocumentRecord, DocumentError>;
    /// Remove a document's bytes and record.
    async fn delete(&self, owner_id: &str, id: &str) -> Result<(), DocumentError>;
    /// Answer a question from a document's extracted text.
    async fn ask(&self, owner_id: &str, id: &str, question: &str)
    -> Result<String, DocumentError>;
    /// Pipeline counters since startup.
    fn metrics(&self) -> MetricsSnapshot;
}

/// Text and summary fields computed for one upload.
struct Enrichment {
    text: String,
    text_status: ExtractionStatus,
    summary: String,
    summary_status: SummaryStatus,
}

/// The ingestion pipeline and owner-scoped document operations.
pub struct DocumentService {
    records: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    extractor: TextExtractor,
    summarizer: SummarizationClient,
    answerer: QuestionAnsweringClient,
    uploads: UploadConfig,
    policy: AiPolicy,
    metrics: PipelineMetrics,
}

impl DocumentService {
    /// Assemble the service from its collaborators.
    pub fn new(
        records: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        extractor: TextExtractor,
        chat: Arc<dyn ChatCompletion>,
        uploads: UploadConfig,
        policy: AiPolicy,
    ) -> Self {
        Self {
            records,
            blobs,
            extractor,
            summarizer: SummarizationClient::new(chat.clone(), &policy),
            answerer: QuestionAnsweringClient::new(chat, &policy),
            uploads,
            policy,
            metrics: PipelineMetrics::new(),
        }
    }

    async fn enrich(&self, bytes: &[u8], kind: MediaKind) -> Enrichment {
        let extraction = match self.extractor.extract(bytes, kind).await {
            Ok(extraction) => extraction,
            Err(err) => {
                tracing::warn!(media_kind = %kind, error = %err, "Text extraction failed");
                return Enrichment {
                    text: String::new(),
                    text_status: ExtractionStatus::Failed,
                    summary: failed_summary(err.public_reason()),
                    summary_status: SummaryStatus::Failed,
                };
            }
        };

        let eligible = extraction.status == ExtractionStatus::Extracted
            && truncate_chars(&extraction.text, self.policy.input_max_chars)
                .chars()
                .count()
                > self.policy.min_text_chars;
        if !eligible {
            return Enrichment {
                text: extraction.text,
                text_status: extraction.status,
                summary: SKIPPED_SUMMARY.to_string(),
                summary_status: SummaryStatus::Skipped,
            };
        }

        let (summary, summary_status) = match self.summarizer.summarize(&extraction.text).await {
            Ok(summary) => (summary, SummaryStatus::Generated),
            Err(err) => {
                tracing::warn!(error = %err, "Summarization failed; storing failure summary");
                (failed_summary(&err), SummaryStatus::Failed)
            }
        };
        Enrichment {
            text: extraction.text,
            text_status: extraction.status,
            summary,
            summary_status,
        }
    }

    async fn owned(&self, owner_id: &str, id: &str) -> Result<DocumentRecord, DocumentError> {
        let record = self
            .records
            .find(id)
            .await?
            .ok_or(DocumentError::NotFound)?;
        if record.owner_id != owner_id {
            tracing::warn!(document_id = id, owner_id, "Rejected access to another user's document");
            return Err(DocumentError::Authorization);
        }
        Ok(record)
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    async fn ingest(
        &self,
        owner_id: &str,
        file: UploadedFile,
    ) -> Result<DocumentRecord, DocumentError> {
        let kind = validate_upload(&file, &self.uploads)?;
        let storage_location = self.blobs.put(kind, &file.bytes).await?;
        let enrichment = self.enrich(&file.bytes, kind).await;

        let now = timestamp_now();
        let record = DocumentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            file_name: file.file_name,
            storage_location,
            media_type: file.media_type,
            size_bytes: file.bytes.len() as u64,
            extracted_text: enrichment.text,
            text_status: enrichment.text_status,
            summary: enrichment.summary,
            summary_status: enrichment.summary_status,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.records.insert(&record).await {
            tracing::error!(error = %err, "Failed to persist document record; removing stored bytes");
            if let Err(cleanup) = self.blobs.delete(&record.storage_location).await {
                tracing::error!(
                    location = %record.storage_location,
                    error = %cleanup,
                    "Failed to remove orphaned upload"
                );
            }
            return Err(err.into());
        }

        self.metrics.record_ingest(
            record.summary_status,
            record.text_status == ExtractionStatus::Failed,
        );
        tracing::info!(
            document_id = %record.id,
            owner_id,
            media_kind = %kind,
            size_bytes = record.size_bytes,
            summary_status = record.summary_status.as_str(),
            "Document ingested"
        );
        Ok(record)
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, DocumentError> {
        Ok(self.records.list_by_owner(owner_id).await?)
    }

    async fn get(&self, owner_id: &str, id: &str) -> Result<DocumentRecord, DocumentError> {
        self.owned(owner_id, id).await
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<(), DocumentError> {
        let record = self.owned(owner_id, id).await?;
        self.blobs.delete(&record.storage_location).await?;
        if !self.records.delete(&record.id).await? {
            return Err(DocumentError::NotFound);
        }
        self.metrics.record_delete();
        tracing::info!(document_id = id, owner_id, "Document deleted");
        Ok(())
    }

    async fn ask(
        &self,
        owner_id: &str,
        id: &str,
        question: &str,
    ) -> Result<String, DocumentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DocumentError::validation(MISSING_QUESTION));
        }
        let record = self.owned(owner_id, id).await?;
        if !record.has_answerable_text(self.policy.min_text_chars) {
            return Err(DocumentError::validation(NOT_ENOUGH_TEXT));
        }

        let answer = self
            .answerer
            .answer(&record.extracted_text, question)
            .await
            .inspect_err(|err| tracing::warn!(document_id = id, error = %err, "Q&A failed"))?;
        self.metrics.record_answer();
        Ok(answer)
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
