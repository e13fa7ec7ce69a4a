//! Route handlers for the document surface (§6.1).

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use hcc_domain::entities::document::{Document, DocumentStatus};
use hcc_domain::value_objects::{DocumentFilter, DocumentId, Page, Pagination};

use super::caller::caller_context_from_headers;
use super::error::ApiError;
use super::AppState;

pub fn documents_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/documents", post(upload_handler).get(list_handler))
        .route("/documents/{id}", get(get_handler).delete(delete_handler))
        .route("/documents/{id}/download", get(download_handler))
        .route("/documents/{id}/reprocess", post(reprocess_handler))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    skip: Option<u32>,
    limit: Option<u32>,
    status: Option<String>,
}

fn parse_document_id(raw: &str) -> Result<DocumentId, ApiError> {
    DocumentId::from_str(raw).map_err(ApiError::from)
}

/// `POST /documents`: multipart upload with a single `file` field. `400`
/// if the field is missing or carries no content type.
async fn upload_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, mut multipart: Multipart) -> Result<Response, ApiError> {
    let caller = caller_context_from_headers(&headers);

    let mut filename = None;
    let mut content_type = None;
    let mut bytes = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| hcc_domain::HccError::InvalidMessage(format!("malformed multipart body: {e}")))? {
        if field.name() != Some("file") {
            continue;
        }
        filename = field.file_name().map(|s| s.to_string());
        content_type = field.content_type().map(|s| s.to_string());
        bytes = Some(field.bytes().await.map_err(|e| hcc_domain::HccError::InvalidMessage(format!("failed to read upload: {e}")))?.to_vec());
        break;
    }

    let (filename, content_type, bytes) = match (filename, content_type, bytes) {
        (Some(filename), Some(content_type), Some(bytes)) => (filename, content_type, bytes),
        _ => {
            state.metrics.record_failure("upload");
            return Err(ApiError::from(hcc_domain::HccError::InvalidMessage(
                "multipart body must include a \"file\" field with a content type".to_string(),
            )));
        }
    };

    let document = state.gateway.upload(bytes, &filename, &content_type, caller.caller_id).await.inspect_err(|_| state.metrics.record_failure("upload"))?;
    state.metrics.record_upload();
    Ok((StatusCode::CREATED, Json(document)).into_response())
}

/// `GET /documents?skip&limit&status`, owner-scoped unless the caller is a
/// superuser.
async fn list_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(query): Query<ListQuery>) -> Result<Json<Page<Document>>, ApiError> {
    let caller = caller_context_from_headers(&headers);

    let status = match query.status {
        Some(raw) => Some(
            DocumentStatus::from_db_str(&raw.to_uppercase())
                .ok_or_else(|| ApiError::from(hcc_domain::HccError::InvalidMessage(format!("unknown status: {raw}"))))?,
        ),
        None => None,
    };
    let filter = DocumentFilter { status, owner_id: None };
    let pagination = Pagination::new(query.skip.unwrap_or(0), query.limit.unwrap_or(Pagination::DEFAULT_LIMIT));

    let page = state.gateway.list(&caller, filter, pagination).await.inspect_err(|_| state.metrics.record_failure("list"))?;
    Ok(Json(page))
}

/// `GET /documents/{id}`: `404` both when the document doesn't exist and
/// when the caller isn't its owner or a superuser.
async fn get_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<Json<Document>, ApiError> {
    let caller = caller_context_from_headers(&headers);
    let id = parse_document_id(&id)?;
    let document = state.gateway.get(&caller, id).await.inspect_err(|_| state.metrics.record_failure("get"))?;
    Ok(Json(document))
}

/// `GET /documents/{id}/download`: raw bytes with the stored content type.
async fn download_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<Response, ApiError> {
    let caller = caller_context_from_headers(&headers);
    let id = parse_document_id(&id)?;
    let object = state.gateway.download(&caller, id).await.inspect_err(|_| state.metrics.record_failure("download"))?;

    let mut response_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&object.content_type) {
        response_headers.insert(axum::http::header::CONTENT_TYPE, value);
    }
    state.metrics.record_download();
    Ok((StatusCode::OK, response_headers, object.bytes).into_response())
}

/// `POST /documents/{id}/reprocess`.
async fn reprocess_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<Json<Document>, ApiError> {
    let caller = caller_context_from_headers(&headers);
    let id = parse_document_id(&id)?;
    let document = state.gateway.reprocess(&caller, id).await.inspect_err(|_| state.metrics.record_failure("reprocess"))?;
    state.metrics.record_reprocess();
    Ok(Json(document))
}

/// `DELETE /documents/{id}`.
async fn delete_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let caller = caller_context_from_headers(&headers);
    let id = parse_document_id(&id)?;
    state.gateway.delete(&caller, id).await.inspect_err(|_| state.metrics.record_failure("delete"))?;
    state.metrics.record_delete();
    Ok(StatusCode::NO_CONTENT)
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state.metrics.encode().map_err(ApiError::from)
}

pub async fn health_handler() -> StatusCode {
    StatusCode::OK
}
