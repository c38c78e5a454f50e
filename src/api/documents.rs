use super::{AppError, AppState, auth::AuthUser};
use crate::documents::{DocumentRecord, SummaryStatus, UploadedFile};
use crate::extraction::ExtractionStatus;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;

/// Multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "document";

/// Client-facing JSON view of a [`DocumentRecord`]; never includes the storage location.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DocumentResponse {
    #[serde(rename = "_id")]
    id: String,
    user: String,
    file_name: String,
    file_type: String,
    file_size: u64,
    extracted_text: String,
    text_status: ExtractionStatus,
    summary: String,
    summary_status: SummaryStatus,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(record: DocumentRecord) -> Self {
        Self {
            id: record.id,
            user: record.owner_id,
            file_name: record.file_name,
            file_type: record.media_type,
            file_size: record.size_bytes,
            extracted_text: record.extracted_text,
            text_status: record.text_status,
            summary: record.summary,
            summary_status: record.summary_status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Accept a multipart upload and run it through the ingestion pipeline.
pub(super) async fn upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::validation(format!("Invalid upload: {}", err.body_text())))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let media_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::validation(format!("Invalid upload: {}", err.body_text())))?;
        file = Some(UploadedFile {
            file_name,
            media_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let file = file.ok_or_else(|| AppError::validation("No file uploaded"))?;
    let record = state.documents.ingest(&user.id, file).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "File uploaded and processed successfully",
            "document": DocumentResponse::from(record),
        })),
    ))
}

pub(super) async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let records = state.documents.list(&user.id).await?;
    Ok(Json(records.into_iter().map(DocumentResponse::from).collect()))
}

pub(super) async fn get_one(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let record = state.documents.get(&user.id, &id).await?;
    Ok(Json(record.into()))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.documents.delete(&user.id, &id).await?;
    Ok(Json(json!({ "message": "Document deleted successfully" })))
}

#[derive(Deserialize)]
pub(super) struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

/// Answer a question about one document. A missing or unreadable body counts as a blank question.
pub(super) async fn ask(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    body: Option<Json<AskRequest>>,
) -> Result<Json<Value>, AppError> {
    let question = body
        .and_then(|Json(request)| request.question)
        .unwrap_or_default();
    let answer = state.documents.ask(&user.id, &id, &question).await?;
    Ok(Json(json!({ "answer": answer })))
}
