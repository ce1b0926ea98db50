//! share-drop - Link-based file sharing with optional passwords and expiry
//!
//! This crate provides upload, owner listing, public share lookups and gated downloads with:
//! - Unguessable share tokens decoupled from internal blob keys
//! - Lazy expiry and password checks at access time
//! - Share metadata replicated via muster (Raft-like clustering)
//! - redb embedded database for metadata (ACID, MVCC, crash-safe)
//! - REST API with multipart upload and streaming download

pub mod api;
pub mod auth;
pub mod config;
pub mod object_store;
pub mod sharing;
pub mod state_machine;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use auth::Authenticator;
use config::Config;
use object_store::BlobStore;
use state_machine::ShareStateMachine;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub node: Arc<muster::RedbNode<ShareStateMachine>>,
    pub blobs: BlobStore,
    pub authenticator: Arc<dyn Authenticator>,
}
