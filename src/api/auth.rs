use super::{AppError, AppState};
use crate::auth::{AuthError, Identity, Session};
use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use serde::Deserialize;

/// The caller resolved from an `Authorization: Bearer <token>` header.
pub struct AuthUser(pub Identity);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Unauthorized("no token"))?;
        Ok(Self(state.auth.authenticate(token).await?))
    }
}

#[derive(Default, Deserialize)]
pub(super) struct RegisterRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Default, Deserialize)]
pub(super) struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// Create an account. A missing or unreadable body is treated as empty fields.
pub(super) async fn register(
    State(state): State<AppState>,
    body: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let session = state
        .auth
        .register(&request.username, &request.email, &request.password)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub(super) async fn login(
    State(state): State<AppState>,
    body: Option<Json<LoginRequest>>,
) -> Result<Json<Session>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    Ok(Json(state.auth.login(&request.email, &request.password).await?))
}

pub(super) async fn me(AuthUser(identity): AuthUser) -> Json<Identity> {
    Json(identity)
}
