mod files;
mod health;
mod share;

use axum::http::{header, HeaderMap};

use crate::api::response::ApiError;
use crate::config::Config;
use crate::object_store::ObjectStoreError;
use crate::sharing::ShareError;
use crate::storage::DatabaseError;

pub use files::{delete_file, list_my_files, upload_file};
pub use health::health;
pub use share::{download_file, file_info};

/// Map a MusterError to an ApiError
fn replication_error(e: muster::MusterError) -> ApiError {
    match e {
        muster::MusterError::NotLeader { .. } => {
            ApiError::unavailable("No leader available, retry shortly")
        }
        muster::MusterError::NoQuorum => {
            ApiError::unavailable("Failed to reach quorum for replication")
        }
        _ => {
            tracing::error!(error = %e, "Replication failed");
            ApiError::internal("Storage failure")
        }
    }
}

/// Registry failures keep their detail in the logs only
fn storage_error(e: DatabaseError) -> ApiError {
    tracing::error!(error = %e, "Share registry failure");
    ApiError::internal("Storage failure")
}

fn object_store_error(e: ObjectStoreError) -> ApiError {
    match e {
        ObjectStoreError::PayloadTooLarge { limit, .. } => ApiError::payload_too_large(format!(
            "File exceeds maximum upload size of {limit} bytes"
        )),
        ObjectStoreError::NotFound(_) => ApiError::not_found("File content not found"),
        _ => {
            tracing::error!(error = %e, "Blob store failure");
            ApiError::internal("Storage failure")
        }
    }
}

fn share_error(e: ShareError) -> ApiError {
    match e {
        ShareError::Validation(message) => ApiError::bad_request(message),
        ShareError::TokenGeneration => {
            tracing::error!("System random source failed while generating a share token");
            ApiError::internal("Failed to create share link")
        }
    }
}

/// Origin that share links are built on: the configured public URL, or the
/// scheme and host the request arrived with.
fn link_base(config: &Config, headers: &HeaderMap) -> String {
    if let Some(ref base) = config.public_base_url {
        return base.clone();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .filter(|proto| *proto == "https" || *proto == "http")
        .unwrap_or("http");

    format!("{scheme}://{host}")
}

fn share_link(base: &str, share_token: &str) -> String {
    format!("{base}/files/{share_token}/content")
}
