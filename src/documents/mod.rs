//! Document records and the operations users perform on them.
//!
//! [`DocumentService`] is the ingestion pipeline (validate, store bytes, extract, summarize,
//! persist) plus the owner-scoped list/get/delete/ask operations. The HTTP layer only sees the
//! [`DocumentApi`] trait.

mod service;
mod types;
pub mod validation;

pub use service::{DocumentApi, DocumentService};
pub use types::{
    DocumentError, DocumentRecord, SKIPPED_SUMMARY, SummaryStatus, UploadedFile, failed_summary,
};
