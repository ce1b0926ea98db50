use redb::{ReadableTable, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;

impl Database {
    /// Store a new file record, rejecting reuse of its id, share token or internal name
    pub fn create_file(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert!(
            !file.share_token.is_empty(),
            "file share token must not be empty"
        );

        let write_txn = self.begin_write()?;
        {
            let files = write_txn.open_table(FILES)?;
            if files.get(file.id.as_str())?.is_some() {
                return Err(DatabaseError::Conflict(format!(
                    "file id '{}' already exists",
                    file.id
                )));
            }

            let tokens = write_txn.open_table(SHARE_TOKENS)?;
            if tokens.get(file.share_token.as_str())?.is_some() {
                return Err(DatabaseError::Conflict(
                    "share token is already in use".to_string(),
                ));
            }

            let names = write_txn.open_table(INTERNAL_NAMES)?;
            if names.get(file.internal_name.as_str())?.is_some() {
                return Err(DatabaseError::Conflict(format!(
                    "internal name '{}' is already in use",
                    file.internal_name
                )));
            }
        }
        write_record(&write_txn, file)?;
        write_txn.commit()?;
        Ok(())
    }

    /// Replace the whole registry with `files` in one transaction (snapshot restore).
    /// Records and index entries absent from `files` are dropped.
    pub fn replace_all_files(&self, files: &[FileRecord]) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        write_txn.delete_table(FILES)?;
        write_txn.delete_table(SHARE_TOKENS)?;
        write_txn.delete_table(INTERNAL_NAMES)?;
        write_txn.delete_table(OWNER_FILES)?;

        // Recreate even when `files` is empty; readers expect every table to exist
        write_txn.open_table(FILES)?;
        write_txn.open_table(SHARE_TOKENS)?;
        write_txn.open_table(INTERNAL_NAMES)?;
        write_txn.open_table(OWNER_FILES)?;

        for file in files {
            write_record(&write_txn, file)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file by its UUID, regardless of owner or active state
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get an active file by its share token (resolves token -> uuid -> file).
    /// Expiry and password are not checked here.
    pub fn get_file_by_token(&self, token: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let token_table = read_txn.open_table(SHARE_TOKENS)?;

        let id = match token_table.get(token)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let files_table = read_txn.open_table(FILES)?;
        match files_table.get(id.as_str())? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file).filter(|f| f.is_active))
            }
            None => Ok(None),
        }
    }

    /// Get a file by UUID only if `owner_id` owns it. Inactive records are included
    /// so their owner can still delete them.
    pub fn get_file_for_owner(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        Ok(self.get_file(id)?.filter(|f| f.owner_id == owner_id))
    }

    /// Active files owned by `owner_id`, newest first
    pub fn list_files_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                if file.is_active {
                    files.push(file);
                }
            }
        }

        files.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(files)
    }

    /// Add one to the download counter of the active file behind `token`.
    /// Returns the new count, or `None` if no such file exists.
    pub fn increment_download_count(&self, token: &str) -> Result<Option<u64>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let count = {
            let token_table = write_txn.open_table(SHARE_TOKENS)?;
            let id = token_table.get(token)?.map(|v| v.value().to_string());

            let mut files = write_txn.open_table(FILES)?;
            let existing: Option<FileRecord> = match id {
                Some(ref id) => match files.get(id.as_str())? {
                    Some(data) => Some(rmp_serde::from_slice(data.value())?),
                    None => None,
                },
                None => None,
            };

            match existing {
                Some(mut file) if file.is_active => {
                    file.download_count = file.download_count.saturating_add(1);
                    let data = rmp_serde::to_vec_named(&file)?;
                    files.insert(file.id.as_str(), data.as_slice())?;
                    Some(file.download_count)
                }
                _ => None,
            }
        };

        write_txn.commit()?;
        Ok(count)
    }

    /// Permanently delete a file owned by `owner_id` and clean up every index
    pub fn delete_file(&self, id: &str, owner_id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let existing: Option<FileRecord> = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        let deleted = match existing {
            Some(file) if file.owner_id == owner_id => {
                {
                    let mut table = write_txn.open_table(FILES)?;
                    table.remove(id)?;
                }
                {
                    let mut token_table = write_txn.open_table(SHARE_TOKENS)?;
                    token_table.remove(file.share_token.as_str())?;
                }
                {
                    let mut name_table = write_txn.open_table(INTERNAL_NAMES)?;
                    name_table.remove(file.internal_name.as_str())?;
                }

                let file_ids: Option<Vec<String>> = {
                    let owner_table = write_txn.open_table(OWNER_FILES)?;
                    let result = match owner_table.get(owner_id)? {
                        Some(data) => Some(rmp_serde::from_slice(data.value())?),
                        None => None,
                    };
                    result
                };

                if let Some(mut ids) = file_ids {
                    ids.retain(|fid| fid != id);
                    let mut owner_table = write_txn.open_table(OWNER_FILES)?;
                    if ids.is_empty() {
                        owner_table.remove(owner_id)?;
                    } else {
                        let data = rmp_serde::to_vec_named(&ids)?;
                        owner_table.insert(owner_id, data.as_slice())?;
                    }
                }
                true
            }
            _ => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// Get all files (for snapshot/restore)
    pub fn get_all_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            files.push(file);
        }

        Ok(files)
    }
}

/// Insert the record and its token, internal name and owner index entries
fn write_record(write_txn: &WriteTransaction, file: &FileRecord) -> Result<(), DatabaseError> {
    let mut table = write_txn.open_table(FILES)?;
    let data = rmp_serde::to_vec_named(file)?;
    table.insert(file.id.as_str(), data.as_slice())?;

    let mut token_table = write_txn.open_table(SHARE_TOKENS)?;
    token_table.insert(file.share_token.as_str(), file.id.as_str())?;

    let mut name_table = write_txn.open_table(INTERNAL_NAMES)?;
    name_table.insert(file.internal_name.as_str(), file.id.as_str())?;

    let mut owner_table = write_txn.open_table(OWNER_FILES)?;
    let mut file_ids: Vec<String> = match owner_table.get(file.owner_id.as_str())? {
        Some(data) => rmp_serde::from_slice(data.value())?,
        None => Vec::new(),
    };

    if !file_ids.contains(&file.id) {
        file_ids.push(file.id.clone());
        let index_data = rmp_serde::to_vec_named(&file_ids)?;
        owner_table.insert(file.owner_id.as_str(), index_data.as_slice())?;
    }
    Ok(())
}
