use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::{object_store_error, replication_error, storage_error};
use crate::api::response::{ApiError, AppQuery, JSend};
use crate::object_store::ObjectStoreError;
use crate::sharing::access::{self, Access};
use crate::storage::models::{FileRecord, WriteOp};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

/// Public view of a share. Reveals whether a password is set, never the password.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareInfoResponse {
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub download_count: u64,
    pub uploaded_at: String,
    pub expires_at: Option<String>,
    pub has_password: bool,
    pub uploaded_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    #[serde(default)]
    pub password: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn file_info(
    State(state): State<Arc<AppState>>,
    Path(share_token): Path<String>,
) -> Result<Json<JSend<ShareInfoResponse>>, ApiError> {
    let file = find_share(&state, &share_token)?;

    if access::is_expired(&file, Utc::now()) {
        return Err(ApiError::gone("File has expired"));
    }

    let uploaded_by = match state.authenticator.display_name(&file.owner_id).await {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(owner_id = %file.owner_id, error = %e, "Failed to resolve owner name");
            None
        }
    };

    Ok(JSend::success(ShareInfoResponse {
        has_password: file.has_password(),
        original_name: file.original_name,
        size: file.byte_size,
        mime_type: file.mime_type,
        download_count: file.download_count,
        uploaded_at: file.created_at.to_rfc3339(),
        expires_at: file.expires_at.map(|at| at.to_rfc3339()),
        uploaded_by,
    }))
}

/// Stream a shared file to anyone holding its token (and password, if set).
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(share_token): Path<String>,
    AppQuery(params): AppQuery<DownloadParams>,
) -> Result<Response, ApiError> {
    // Unknown tokens fail before anything about the password is revealed
    let file = find_share(&state, &share_token)?;

    match access::evaluate(&file, params.password.as_deref(), Utc::now()) {
        Access::Allow => {}
        Access::Expired => return Err(ApiError::gone("File has expired")),
        Access::PasswordRequired => return Err(ApiError::unauthorized("Password required")),
        Access::PasswordMismatch => return Err(ApiError::unauthorized("Incorrect password")),
    }

    let reader = state
        .blobs
        .open(&file.internal_name)
        .await
        .map_err(|e| match e {
            ObjectStoreError::NotFound(_) => {
                tracing::warn!(file_id = %file.id, "Share has no blob content");
                ApiError::not_found("File not found")
            }
            _ => object_store_error(e),
        })?;

    state
        .node
        .replicate(WriteOp::RecordDownload {
            share_token: file.share_token.clone(),
        })
        .await
        .map_err(replication_error)?;

    tracing::debug!(file_id = %file.id, "Serving shared file");

    let mut response = (StatusCode::OK, Body::from_stream(ReaderStream::new(reader))).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        file.mime_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        header::HeaderValue::from(file.byte_size),
    );

    if let Ok(value) = content_disposition(&file.original_name).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Every download is counted and may be password gated
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("private, no-store"),
    );

    Ok(response)
}

// ============================================================================
// Helpers
// ============================================================================

fn find_share(state: &AppState, share_token: &str) -> Result<FileRecord, ApiError> {
    state
        .db
        .get_file_by_token(share_token)
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("File not found"))
}

/// `attachment` disposition naming the original file. Control characters,
/// quotes and backslashes are replaced in the plain `filename`, and non-ASCII
/// names also get an RFC 5987 `filename*`.
fn content_disposition(original_name: &str) -> String {
    let needs_escaping = |c: char| c.is_control() || c == '"' || c == '\\';

    if original_name.is_ascii() && !original_name.chars().any(needs_escaping) {
        return format!("attachment; filename=\"{original_name}\"");
    }

    let fallback: String = original_name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if needs_escaping(c) || !c.is_ascii() { '_' } else { c })
        .collect();

    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(original_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes_and_newlines() {
        assert_eq!(
            content_disposition("a\"b\r\n.txt"),
            "attachment; filename=\"a_b.txt\"; filename*=UTF-8''a%22b%0D%0A.txt"
        );
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        assert_eq!(
            content_disposition("résumé.pdf"),
            "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
    }
}
