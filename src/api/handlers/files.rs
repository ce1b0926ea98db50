use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::{
    link_base, object_store_error, replication_error, share_error, share_link, storage_error,
};
use crate::api::extract::CurrentUser;
use crate::api::response::{ApiError, JSend};
use crate::sharing::{Expiry, NewShare};
use crate::storage::models::{FileRecord, WriteOp};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub original_name: String,
    pub size: u64,
    pub share_token: String,
    pub share_link: String,
    pub uploaded_at: String,
    pub expires_at: Option<String>,
}

/// One of the caller's shares. Never carries the internal blob name or the password.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub share_token: String,
    pub share_link: String,
    pub download_count: u64,
    pub has_password: bool,
    pub uploaded_at: String,
    pub expires_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MyFilesResponse {
    pub files: Vec<FileSummary>,
}

/// The `file` part of an upload form
struct UploadedFile {
    name: String,
    content_type: Option<String>,
    data: Bytes,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<JSend<UploadResponse>>, ApiError> {
    let mut upload: Option<UploadedFile> = None;
    let mut password: Option<String> = None;
    let mut expires_in: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let name = field.file_name().map(client_file_name).unwrap_or_default();
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field.bytes().await.map_err(multipart_error)?;

                if data.len() as u64 > state.blobs.max_size() {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {} bytes",
                        state.blobs.max_size()
                    )));
                }

                upload = Some(UploadedFile {
                    name,
                    content_type,
                    data,
                });
            }
            "password" => {
                password = Some(field.text().await.map_err(multipart_error)?);
            }
            "expiresIn" => {
                expires_in = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    if upload.name.is_empty() {
        return Err(ApiError::bad_request("Uploaded file must have a file name"));
    }
    let expires_in = Expiry::parse(expires_in.as_deref()).map_err(share_error)?;

    // Determine MIME type: from multipart Content-Type, or guess from filename, or fallback
    let mime_type = upload
        .content_type
        .filter(|ct| ct != "application/octet-stream")
        .or_else(|| {
            mime_guess::from_path(&upload.name)
                .first()
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let byte_size = upload.data.len() as u64;

    // Phase 1: Write bytes to the blob store under a fresh internal name
    let internal_name = state
        .blobs
        .write(upload.data, &upload.name)
        .await
        .map_err(object_store_error)?;

    // Phase 2: Register the share via muster
    let new_share = NewShare {
        owner_id: user.id.clone(),
        original_name: upload.name,
        byte_size,
        mime_type,
        internal_name,
        password,
        expires_in,
    };
    let record = register_share(&state, new_share).await?;

    tracing::info!(
        file_id = %record.id,
        owner_id = %record.owner_id,
        byte_size = record.byte_size,
        "Shared file"
    );

    let base = link_base(&state.config, &headers);
    Ok(JSend::success(UploadResponse {
        share_link: share_link(&base, &record.share_token),
        id: record.id,
        original_name: record.original_name,
        size: record.byte_size,
        share_token: record.share_token,
        uploaded_at: record.created_at.to_rfc3339(),
        expires_at: record.expires_at.map(|at| at.to_rfc3339()),
    }))
}

pub async fn list_my_files(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
) -> Result<Json<JSend<MyFilesResponse>>, ApiError> {
    let files = state
        .db
        .list_files_by_owner(&user.id)
        .map_err(storage_error)?;

    let base = link_base(&state.config, &headers);
    let files = files
        .iter()
        .map(|file| file_to_summary(file, &base))
        .collect();

    Ok(JSend::success(MyFilesResponse { files }))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    // Files owned by someone else look exactly like missing ones
    let file = state
        .db
        .get_file_for_owner(&id, &user.id)
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    // Phase 1: Delete the blob. A failure keeps the record so the delete can be retried.
    state
        .blobs
        .delete(&file.internal_name)
        .await
        .map_err(object_store_error)?;

    // Phase 2: Remove metadata via muster
    let operation = WriteOp::DeleteFile {
        id: id.clone(),
        owner_id: user.id.clone(),
    };
    state
        .node
        .replicate(operation)
        .await
        .map_err(replication_error)?;

    tracing::info!(file_id = %id, owner_id = %user.id, "Deleted file");
    Ok(JSend::success(()))
}

// ============================================================================
// Helpers
// ============================================================================

fn file_to_summary(file: &FileRecord, base: &str) -> FileSummary {
    FileSummary {
        id: file.id.clone(),
        original_name: file.original_name.clone(),
        size: file.byte_size,
        mime_type: file.mime_type.clone(),
        share_token: file.share_token.clone(),
        share_link: share_link(base, &file.share_token),
        download_count: file.download_count,
        has_password: file.has_password(),
        uploaded_at: file.created_at.to_rfc3339(),
        expires_at: file.expires_at.map(|at| at.to_rfc3339()),
    }
}

/// Browsers may send a full client path; keep only the last segment.
fn client_file_name(raw: &str) -> String {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim().to_string()
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("File exceeds maximum upload size")
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}

/// Record a share for a blob that is already written. The blob is removed when the
/// share cannot be registered.
async fn register_share(state: &AppState, share: NewShare) -> Result<FileRecord, ApiError> {
    let internal_name = share.internal_name.clone();
    let record = match share.into_record(Utc::now()) {
        Ok(record) => record,
        Err(e) => {
            discard_blob(state, &internal_name).await;
            return Err(share_error(e));
        }
    };

    if let Err(e) = state
        .node
        .replicate(WriteOp::CreateFile(record.clone()))
        .await
    {
        discard_blob(state, &internal_name).await;
        return Err(replication_error(e));
    }

    Ok(record)
}

/// Best-effort removal of a blob whose share was never registered
async fn discard_blob(state: &AppState, internal_name: &str) {
    if let Err(e) = state.blobs.delete(internal_name).await {
        tracing::warn!(
            internal_name = %internal_name,
            error = %e,
            "Failed to remove orphaned blob"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharing::Expiry;
    use crate::testutil::test_state;

    fn share_for(internal_name: &str, owner_id: &str) -> NewShare {
        NewShare {
            owner_id: owner_id.to_string(),
            original_name: "notes.txt".to_string(),
            byte_size: 6,
            mime_type: "text/plain".to_string(),
            internal_name: internal_name.to_string(),
            password: None,
            expires_in: Expiry::Never,
        }
    }

    #[tokio::test]
    async fn test_register_share_keeps_blob_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let internal_name = state
            .blobs
            .write(Bytes::from_static(b"stored"), "notes.txt")
            .await
            .unwrap();

        let record = register_share(&state, share_for(&internal_name, "user-alice"))
            .await
            .unwrap();

        assert!(state.blobs.exists(&internal_name).await.unwrap());
        assert_eq!(
            state.db.get_file(&record.id).unwrap().unwrap().internal_name,
            internal_name
        );
    }

    #[tokio::test]
    async fn test_register_share_discards_blob_when_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let internal_name = state
            .blobs
            .write(Bytes::from_static(b"orphan"), "notes.txt")
            .await
            .unwrap();

        let err = register_share(&state, share_for(&internal_name, ""))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(!state.blobs.exists(&internal_name).await.unwrap());
        assert!(state.db.get_all_files().unwrap().is_empty());
    }

    #[test]
    fn test_client_file_name() {
        assert_eq!(client_file_name("report.pdf"), "report.pdf");
        assert_eq!(client_file_name("C:\\Users\\me\\report.pdf"), "report.pdf");
        assert_eq!(client_file_name("/home/me/notes.txt"), "notes.txt");
        assert_eq!(client_file_name("dir/"), "");
    }
}
