use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shared file record stored in redb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    // System fields
    pub id: String,
    pub internal_name: String,
    pub share_token: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,

    // Upload metadata
    pub original_name: String,
    pub mime_type: String,
    pub byte_size: u64,

    // Sharing policy
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(default)]
    pub download_count: u64,
}

fn default_active() -> bool {
    true
}

impl FileRecord {
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

/// Types of write operations (replicated via muster)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WriteOp {
    CreateFile(FileRecord),
    DeleteFile { id: String, owner_id: String },
    RecordDownload { share_token: String },
}
