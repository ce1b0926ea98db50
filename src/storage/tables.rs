use redb::TableDefinition;

/// File records: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Share token index: share_token -> uuid (public download/info lookups)
pub const SHARE_TOKENS: TableDefinition<&str, &str> = TableDefinition::new("share_tokens");

/// Blob key index: internal_name -> uuid (uniqueness of object store keys)
pub const INTERNAL_NAMES: TableDefinition<&str, &str> = TableDefinition::new("internal_names");

/// Owner index: owner_id -> msgpack Vec of file UUIDs
pub const OWNER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_files");
