//! HTTP routes for the operator UI

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ActionResult, AssignRequest, InboxState, IncomingNo, SkipRequest};
use crate::AppState;

/// Identity attached to a request by [`require_session`]
#[derive(Debug, Clone)]
pub struct Operator {
    pub username: String,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/logout", post(logout))
        .route("/api/verify", get(verify))
        .route("/api/state", get(get_state))
        .route("/api/skip", post(skip))
        .route("/api/assign", post(assign))
        .route("/api/undo", post(undo))
        .route("/files/:incoming_no/:filename", get(get_file))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/login", post(login))
        .merge(protected)
        .with_state(state)
}

/// Accept a session token from `Authorization: Bearer` or `?token=`
async fn require_session(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&headers).or(query.token);

    if !state.sessions.is_enabled() {
        request.extensions_mut().insert(Operator {
            username: "anonymous".to_string(),
            token,
        });
        return Ok(next.run(request).await);
    }

    let Some(token) = token else {
        tracing::debug!("No session token provided");
        return Err(AppError::Unauthorized("Not authenticated".to_string()));
    };

    match state.sessions.verify(&token).await {
        Some(username) => {
            request.extensions_mut().insert(Operator {
                username,
                token: Some(token),
            });
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!("Invalid or expired session token");
            Err(AppError::Unauthorized(
                "Invalid or expired session".to_string(),
            ))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "kaiten-inbox",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "login": "POST /api/login",
            "logout": "POST /api/logout",
            "verify": "GET /api/verify",
            "state": "GET /api/state",
            "skip": "POST /api/skip",
            "assign": "POST /api/assign",
            "undo": "POST /api/undo",
            "files": "GET /files/{incoming_no}/{filename}",
        }
    }))
}

async fn health() -> &'static str {
    "ok"
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let session = state.sessions.login(&req.username, &req.password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        username: session.username,
        expires_at: session.expires_at,
    }))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(operator): Extension<Operator>,
) -> StatusCode {
    if let Some(token) = &operator.token {
        state.sessions.logout(token).await;
    }
    StatusCode::NO_CONTENT
}

async fn verify(Extension(operator): Extension<Operator>) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        username: operator.username,
    })
}

async fn get_state(State(state): State<Arc<AppState>>) -> Result<Json<InboxState>> {
    Ok(Json(state.workflow.get_state().await?))
}

async fn skip(
    State(state): State<Arc<AppState>>,
    Extension(operator): Extension<Operator>,
    Json(req): Json<SkipRequest>,
) -> Result<Json<InboxState>> {
    tracing::info!(card_id = req.card_id, operator = %operator.username, "Skip requested");
    Ok(Json(state.workflow.skip(req.card_id).await?))
}

async fn assign(
    State(state): State<Arc<AppState>>,
    Extension(operator): Extension<Operator>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<ActionResult>> {
    tracing::info!(
        card_id = req.card_id,
        owner_id = req.owner_id,
        operator = %operator.username,
        "Assign requested"
    );
    Ok(Json(state.workflow.assign(req).await?))
}

async fn undo(
    State(state): State<Arc<AppState>>,
    Extension(operator): Extension<Operator>,
) -> Result<Json<ActionResult>> {
    tracing::info!(operator = %operator.username, "Undo requested");
    Ok(Json(state.workflow.undo().await?))
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    Path((incoming_no, filename)): Path<(IncomingNo, String)>,
) -> Result<impl IntoResponse> {
    let bytes = state.files.read(incoming_no, &filename).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&filename)),
        ],
        bytes,
    ))
}

/// `inline` disposition with an ASCII fallback name and the exact UTF-8 name
/// in RFC 5987 form, so Cyrillic letter names survive the browser
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
