use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use share_drop::{
    api,
    auth::{Authenticator, RemoteAuthenticator, StaticAuthenticator},
    config::Config,
    object_store::{BlobStore, LocalStore},
    state_machine::ShareStateMachine,
    storage::Database,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "share-drop starting");

    let config = Config::load()?;
    info!(node_id = %config.node.id, "Loaded configuration");

    let db = Database::open(&config.node.data_dir)?;
    info!(data_dir = %config.node.data_dir, "Share registry opened");

    let backend = LocalStore::new(&config.storage.local_storage_path)?;
    info!(
        path = %config.storage.local_storage_path,
        max_upload_size = config.max_upload_size,
        "Blob store ready"
    );
    let blobs = BlobStore::new(Arc::new(backend), config.max_upload_size);

    let authenticator = build_authenticator(&config)?;

    // muster shares the redb instance with the share registry
    let muster_storage = muster::RedbStorage::new(db.inner())?;
    let state_machine = ShareStateMachine::new(db.clone());
    let node = muster::MusterNode::new(muster_config(&config), muster_storage, state_machine)?;
    info!(cluster_port = config.cluster.cluster_port, "Running as a single node");

    // Heartbeat, election, discovery and the cluster TCP server
    let cluster_handles = node.start();

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        node: Arc::clone(&node),
        blobs,
        authenticator,
    });

    let app = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!(address = %config.node.bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down background tasks");
    for handle in cluster_handles {
        handle.abort();
    }

    if let Err(e) = node.persist_state().await {
        tracing::error!(error = %e, "Failed to persist cluster state during shutdown");
    }

    info!("Shutdown complete");
    Ok(())
}

/// `LOG_FORMAT=json` for JSON lines, `gcp` for Stackdriver, anything else for text.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    match std::env::var("LOG_FORMAT")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "gcp" => registry.with(tracing_stackdriver::layer()).init(),
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_list(false),
            )
            .init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn build_authenticator(config: &Config) -> anyhow::Result<Arc<dyn Authenticator>> {
    match config.auth.service_url {
        Some(ref url) => {
            info!(url = %url, "Resolving credentials via user service");
            let timeout = Duration::from_millis(config.auth.timeout_ms);
            Ok(Arc::new(RemoteAuthenticator::new(url, timeout)?))
        }
        None => {
            tracing::warn!(
                tokens = config.auth.static_tokens.len(),
                "Using static credentials from AUTH_STATIC_TOKENS"
            );
            Ok(Arc::new(StaticAuthenticator::new(
                &config.auth.static_tokens,
            )))
        }
    }
}

/// Peers are listed by HTTP address; muster talks to them on the cluster port.
fn muster_config(config: &Config) -> muster::Config {
    let cluster_port = config.cluster.cluster_port;
    let peers = config
        .cluster
        .peers
        .iter()
        .map(|peer| {
            let host = peer.rsplit_once(':').map_or(peer.as_str(), |(host, _)| host);
            format!("{host}:{cluster_port}")
        })
        .collect();

    muster::Config {
        node_id: config.node.id.clone(),
        cluster_port,
        heartbeat_interval_ms: config.cluster.heartbeat_interval_ms,
        election_timeout_ms: config.cluster.election_timeout_ms,
        discovery: muster::DiscoveryConfig {
            dns_name: config.cluster.discovery.dns_name.clone(),
            peers,
            poll_interval_secs: config.cluster.discovery.poll_interval_seconds,
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
