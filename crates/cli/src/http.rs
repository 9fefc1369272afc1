//! HTTP resource API over the document library.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, FromRequestParts, Multipart, Query, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use doclassify_core::library::DocumentLibrary;
use doclassify_core::models::{ListQuery, UserId};
use doclassify_core::Error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub library: DocumentLibrary,
    pub default_user: UserId,
    pub max_upload_bytes: usize,
}

pub fn create_router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/upload", post(upload_files))
        .route(
            "/files",
            get(list_files).patch(confirm_file).delete(delete_file),
        )
        .route("/options", get(list_options))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

pub async fn start_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    info!("doclassify HTTP server listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Library(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Library(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Library(e) => {
                let status = match &e {
                    Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    Error::NotFound(_) => StatusCode::NOT_FOUND,
                    Error::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    Error::Completion(_) => StatusCode::BAD_GATEWAY,
                    Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    warn!(error = %e, "request failed");
                }
                let message = match e {
                    Error::InvalidInput(msg) | Error::NotFound(msg) => msg,
                    other => other.to_string(),
                };
                (status, message)
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Caller identity from `X-User-Id`, or the configured default.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match parts.headers.get(USER_HEADER) {
            None => Ok(CurrentUser(state.default_user)),
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map(|id| CurrentUser(UserId(id)))
                .ok_or_else(|| ApiError::BadRequest("invalid X-User-Id header".to_string())),
        }
    }
}

/// POST /upload - store, classify and return suggestions for each `files` part.
async fn upload_files(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        files.push((name, bytes.to_vec()));
    }
    if files.is_empty() {
        return Err(ApiError::BadRequest("No files provided.".to_string()));
    }
    let batch = state.library.upload_many(user, files).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// GET /files?q=&classification=
async fn list_files(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let files = state.library.list(user, &query).await?;
    Ok(Json(json!({ "files": files })))
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

/// Record ids arrive as JSON numbers, numeric strings, or query text.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid id: {:?}", text))),
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub classification: Option<String>,
}

/// PATCH /files - persist the user's chosen label.
async fn confirm_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = payload?;
    let (Some(id), Some(classification)) = (req.id, req.classification.filter(|c| !c.is_empty()))
    else {
        return Err(ApiError::BadRequest(
            "id and classification are required".to_string(),
        ));
    };
    let confirmed = state.library.confirm(user, id, &classification).await?;
    Ok(Json(json!({
        "message": "Classification updated",
        "id": confirmed.id,
        "classification": confirmed.classification,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct IdParam {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
}

/// DELETE /files - id from the JSON body or the query string.
async fn delete_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<IdParam>, QueryRejection>,
    body: Result<Json<IdParam>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(query) = query?;
    let from_body = match body {
        Ok(Json(b)) => b.id,
        // No JSON body at all: the id may still come from the query.
        Err(JsonRejection::MissingJsonContentType(_)) => None,
        Err(e) => return Err(e.into()),
    };
    let id = from_body
        .or(query.id)
        .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))?;
    state.library.delete(user, id).await?;
    Ok(Json(json!({ "message": "File deleted", "id": id })))
}

/// GET /options
async fn list_options(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let options = state.library.options(user).await?;
    Ok(Json(json!({ "options": options })))
}
