//! Shared test helpers for share-drop in-crate tests.

use std::sync::Arc;

use crate::auth::StaticAuthenticator;
use crate::config::{AuthConfig, ClusterConfig, Config, NodeConfig, StaticToken, StorageConfig};
use crate::object_store::{BlobStore, LocalStore, ObjectStore};
use crate::state_machine::ShareStateMachine;
use crate::storage::Database;
use crate::AppState;

/// Bearer token for `alice` (user id `user-alice`).
pub const ALICE_TOKEN: &str = "alice-token";
/// Bearer token for `bob` (user id `user-bob`).
pub const BOB_TOKEN: &str = "bob-token";

/// Create a test AppState with a temporary database, local blob store and two static users.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with_limit(temp_dir, 10 * 1024 * 1024)
}

pub fn test_state_with_limit(temp_dir: &tempfile::TempDir, max_upload_size: u64) -> Arc<AppState> {
    let backend = LocalStore::new(temp_dir.path().join("files"))
        .expect("Failed to create test object store");
    build_state(temp_dir, Arc::new(backend), max_upload_size)
}

/// Like [`test_state`], but storing blobs in the given backend.
pub fn test_state_with_backend(
    temp_dir: &tempfile::TempDir,
    backend: Arc<dyn ObjectStore>,
) -> Arc<AppState> {
    build_state(temp_dir, backend, 10 * 1024 * 1024)
}

fn build_state(
    temp_dir: &tempfile::TempDir,
    backend: Arc<dyn ObjectStore>,
    max_upload_size: u64,
) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let static_tokens = vec![
        StaticToken {
            token: ALICE_TOKEN.to_string(),
            user_id: "user-alice".to_string(),
            username: "alice".to_string(),
        },
        StaticToken {
            token: BOB_TOKEN.to_string(),
            user_id: "user-bob".to_string(),
            username: "bob".to_string(),
        },
    ];

    let config = Config {
        auth: AuthConfig {
            static_tokens: static_tokens.clone(),
            ..Default::default()
        },
        node: NodeConfig {
            id: uuid::Uuid::new_v4().to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        cluster: ClusterConfig::default(),
        storage: StorageConfig {
            local_storage_path: files_dir.to_string_lossy().to_string(),
        },
        max_upload_size,
        public_base_url: None,
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");

    let muster_storage =
        muster::RedbStorage::new(db.inner()).expect("Failed to create muster storage");
    let state_machine = ShareStateMachine::new(db.clone());
    let muster_config = muster::Config {
        node_id: config.node.id.clone(),
        cluster_port: 0,
        heartbeat_interval_ms: 300,
        election_timeout_ms: 3000,
        discovery: muster::DiscoveryConfig {
            dns_name: None,
            peers: vec![],
            poll_interval_secs: 5,
        },
    };
    let node = muster::MusterNode::new(muster_config, muster_storage, state_machine)
        .expect("Failed to create muster node");

    Arc::new(AppState {
        config,
        db,
        node: Arc::clone(&node),
        blobs: BlobStore::new(backend, max_upload_size),
        authenticator: Arc::new(StaticAuthenticator::new(&static_tokens)),
    })
}
