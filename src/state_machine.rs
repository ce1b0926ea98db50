//! share-drop's state machine for muster cluster replication.

use serde::{Deserialize, Serialize};

use crate::storage::models::{FileRecord, WriteOp};
use crate::storage::Database;

/// The share registry state machine, replicated by muster.
pub struct ShareStateMachine {
    db: Database,
}

impl ShareStateMachine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Full state snapshot for syncing lagging followers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShareSnapshot {
    pub files: Vec<FileRecord>,
}

impl muster::StateMachine for ShareStateMachine {
    type WriteOp = WriteOp;
    type Snapshot = ShareSnapshot;

    fn apply(&self, op: &WriteOp) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match op {
            WriteOp::CreateFile(file) => {
                self.db.create_file(file)?;
            }
            WriteOp::DeleteFile { id, owner_id } => {
                self.db.delete_file(id, owner_id)?;
            }
            WriteOp::RecordDownload { share_token } => {
                self.db.increment_download_count(share_token)?;
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<ShareSnapshot, Box<dyn std::error::Error + Send + Sync>> {
        let files = self.db.get_all_files()?;
        Ok(ShareSnapshot { files })
    }

    fn restore(
        &self,
        snapshot: ShareSnapshot,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.db.replace_all_files(&snapshot.files)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster::StateMachine;

    fn record(id: &str, token: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            internal_name: format!("{id}.bin"),
            share_token: token.to_string(),
            owner_id: "owner".to_string(),
            created_at: chrono::Utc::now(),
            original_name: "a.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            byte_size: 3,
            password: None,
            expires_at: None,
            is_active: true,
            download_count: 0,
        }
    }

    #[test]
    fn test_apply_create_download_delete() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let sm = ShareStateMachine::new(db.clone());

        sm.apply(&WriteOp::CreateFile(record("f1", "tok"))).unwrap();
        sm.apply(&WriteOp::RecordDownload {
            share_token: "tok".to_string(),
        })
        .unwrap();
        assert_eq!(db.get_file("f1").unwrap().unwrap().download_count, 1);

        sm.apply(&WriteOp::DeleteFile {
            id: "f1".to_string(),
            owner_id: "owner".to_string(),
        })
        .unwrap();
        assert!(db.get_file("f1").unwrap().is_none());
    }

    #[test]
    fn test_snapshot_restore() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = Database::open(src_dir.path()).unwrap();
        src.create_file(&record("a", "tok-a")).unwrap();
        src.create_file(&record("b", "tok-b")).unwrap();
        let snapshot = ShareStateMachine::new(src).snapshot().unwrap();

        let dst_dir = tempfile::tempdir().unwrap();
        let dst = Database::open(dst_dir.path()).unwrap();
        ShareStateMachine::new(dst.clone())
            .restore(snapshot)
            .unwrap();

        assert!(dst.get_file_by_token("tok-a").unwrap().is_some());
        assert_eq!(dst.list_files_by_owner("owner").unwrap().len(), 2);
    }

    #[test]
    fn test_restore_drops_records_missing_from_snapshot() {
        let leader_dir = tempfile::tempdir().unwrap();
        let leader = Database::open(leader_dir.path()).unwrap();
        leader.create_file(&record("kept", "tok-kept")).unwrap();
        let snapshot = ShareStateMachine::new(leader).snapshot().unwrap();

        // The follower still holds a share the leader has since deleted
        let follower_dir = tempfile::tempdir().unwrap();
        let follower = Database::open(follower_dir.path()).unwrap();
        follower.create_file(&record("stale", "tok-stale")).unwrap();
        follower.create_file(&record("kept", "tok-kept")).unwrap();

        ShareStateMachine::new(follower.clone())
            .restore(snapshot)
            .unwrap();

        assert!(follower.get_file("stale").unwrap().is_none());
        assert!(follower.get_file_by_token("tok-stale").unwrap().is_none());
        let owned = follower.list_files_by_owner("owner").unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, "kept");

        // The stale share's token and blob name are free again
        follower.create_file(&record("stale", "tok-stale")).unwrap();
    }

    #[test]
    fn test_restore_empty_snapshot_clears_registry() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        db.create_file(&record("gone", "tok-gone")).unwrap();

        ShareStateMachine::new(db.clone())
            .restore(ShareSnapshot { files: Vec::new() })
            .unwrap();

        assert!(db.get_all_files().unwrap().is_empty());
        assert!(db.list_files_by_owner("owner").unwrap().is_empty());
    }
}
