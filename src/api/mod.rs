//! HTTP surface for Docmind.
//!
//! - `POST /auth/register`, `POST /auth/login` – create an account or sign in; both return the
//!   account with a bearer token.
//! - `GET /auth/me` – the account behind the bearer token.
//! - `POST /documents` – multipart upload (field `document`); extracts text, summarizes it, and
//!   returns the stored record with `201`.
//! - `GET /documents`, `GET /documents/:id`, `DELETE /documents/:id` – owner-scoped access.
//! - `POST /documents/:id/ask` – answer `{ "question": ... }` from the document's text.
//! - `GET /health`, `GET /metrics`, `GET /commands` – liveness, pipeline counters, and a
//!   machine-readable catalog of the above.
//!
//! Every failure renders as `{ "message": ... }` with a status that classifies it.

mod auth;
mod documents;
mod error;

pub use auth::AuthUser;
pub use error::AppError;

use crate::auth::AuthApi;
use crate::documents::DocumentApi;
use crate::metrics::MetricsSnapshot;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Services shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document pipeline and access operations.
    pub documents: Arc<dyn DocumentApi>,
    /// Account and token operations.
    pub auth: Arc<dyn AuthApi>,
}

/// Router-level settings taken from configuration.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: u64,
    /// Browser origin allowed by CORS.
    pub cors_allowed_origin: String,
}

/// Build the HTTP router exposing the document and account API.
pub fn create_router(state: AppState, options: &RouterOptions) -> Router {
    let body_limit = usize::try_from(options.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route(
            "/documents",
            get(documents::list)
                .post(documents::upload)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/documents/:id",
            get(documents::get_one).delete(documents::delete),
        )
        .route("/documents/:id/ask", post(documents::ask))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/commands", get(get_commands))
        .layer(cors_layer(&options.cors_allowed_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!(origin, "Ignoring invalid CORS origin");
            layer
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Return pipeline counters since startup.
async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.documents.metrics())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    auth: bool,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by clients and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "register",
                method: "POST",
                path: "/auth/register",
                auth: false,
                description: "Create an account. Returns { \"_id\", \"username\", \"email\", \"token\" }.",
                request_example: Some(json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "password": "correct horse battery staple"
                })),
            },
            CommandDescriptor {
                name: "login",
                method: "POST",
                path: "/auth/login",
                auth: false,
                description: "Sign in with email and password. Returns the account and a bearer token.",
                request_example: Some(json!({
                    "email": "alice@example.com",
                    "password": "correct horse battery staple"
                })),
            },
            CommandDescriptor {
                name: "me",
                method: "GET",
                path: "/auth/me",
                auth: true,
                description: "Return the account behind the bearer token.",
                request_example: None,
            },
            CommandDescriptor {
                name: "upload_document",
                method: "POST",
                path: "/documents",
                auth: true,
                description: "Upload a file as multipart field `document` (pdf, docx, doc, txt, jpeg, png). Text is extracted and summarized; responds 201 with the stored document.",
                request_example: None,
            },
            CommandDescriptor {
                name: "list_documents",
                method: "GET",
                path: "/documents",
                auth: true,
                description: "List the caller's documents, newest first.",
                request_example: None,
            },
            CommandDescriptor {
                name: "get_document",
                method: "GET",
                path: "/documents/:id",
                auth: true,
                description: "Return one of the caller's documents.",
                request_example: None,
            },
            CommandDescriptor {
                name: "delete_document",
                method: "DELETE",
                path: "/documents/:id",
                auth: true,
                description: "Delete a document and its stored file.",
                request_example: None,
            },
            CommandDescriptor {
                name: "ask_document",
                method: "POST",
                path: "/documents/:id/ask",
                auth: true,
                description: "Answer a question using only the document's extracted text. Returns { \"answer\": string }.",
                request_example: Some(json!({ "question": "What is the main conclusion?" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                auth: false,
                description: "Return pipeline counters: documents ingested, summaries generated/skipped/failed, extraction failures, questions answered, documents deleted.",
                request_example: None,
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                auth: false,
                description: "Liveness probe with the server version.",
                request_example: None,
            },
        ],
    })
}
