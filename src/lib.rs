#![deny(missing_docs)]

//! Core library for the Docmind document server: upload, extract, summarize, and ask.

/// HTTP routing and REST handlers.
pub mod api;
/// Accounts, password hashing, and bearer tokens.
pub mod auth;
/// Environment-driven configuration management.
pub mod config;
/// Document records, upload validation, and the ingestion pipeline.
pub mod documents;
/// Plain-text extraction from uploaded files.
pub mod extraction;
/// Language-model provider client and prompt builders.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Record, account, and raw byte persistence.
pub mod storage;
