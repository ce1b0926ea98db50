use thiserror::Error;

use crate::object_store::DEFAULT_MAX_BLOB_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    pub cluster: ClusterConfig,
    pub node: NodeConfig,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Base used for share links (e.g. `https://share.example.com`). When unset,
    /// links are built from the request's Host header.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// TCP port for inter-node cluster communication
    pub cluster_port: u16,
    pub discovery: DiscoveryConfig,
    pub election_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub peers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// DNS name to resolve for peer discovery (e.g., a Kubernetes headless service).
    pub dns_name: Option<String>,
    /// How often to poll for peer changes (seconds)
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory for the local blob backend
    pub local_storage_path: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the external user service
    pub service_url: Option<String>,
    /// Fixed `token:user_id:username` credentials, used when no service is configured
    pub static_tokens: Vec<StaticToken>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticToken {
    pub token: String,
    pub user_id: String,
    pub username: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dns_name: None,
            poll_interval_seconds: 5,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_port: 9993,
            discovery: DiscoveryConfig::default(),
            election_timeout_ms: 3000,
            heartbeat_interval_ms: 300,
            peers: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_storage_path: "./files".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            static_tokens: Vec::new(),
            timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let node_id = env_string("NODE_ID").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let peers: Vec<String> = env_string("PEERS")
            .map(|p| {
                p.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .filter(|s| !s.starts_with(&format!("{node_id}:")) && s != &node_id)
                    .collect()
            })
            .unwrap_or_default();

        let static_tokens = match env_string("AUTH_STATIC_TOKENS") {
            Some(raw) => parse_static_tokens(&raw)?,
            None => Vec::new(),
        };

        let defaults = ClusterConfig::default();
        let config = Config {
            auth: AuthConfig {
                service_url: env_string("AUTH_SERVICE_URL"),
                static_tokens,
                timeout_ms: env_parse("AUTH_TIMEOUT_MS", 5000),
            },
            cluster: ClusterConfig {
                cluster_port: env_parse("CLUSTER_PORT", defaults.cluster_port),
                peers,
                discovery: DiscoveryConfig {
                    dns_name: env_string("DISCOVERY_DNS_NAME"),
                    poll_interval_seconds: env_parse(
                        "DISCOVERY_POLL_INTERVAL",
                        defaults.discovery.poll_interval_seconds,
                    ),
                },
                ..defaults
            },
            node: NodeConfig {
                bind_address: env_string("BIND_ADDRESS")
                    .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
                data_dir: env_string("DATA_DIR").unwrap_or_else(|| "./data".to_string()),
                id: node_id,
            },
            storage: StorageConfig {
                local_storage_path: env_string("LOCAL_STORAGE_PATH")
                    .unwrap_or_else(|| StorageConfig::default().local_storage_path),
            },
            max_upload_size: env_parse("MAX_UPLOAD_SIZE", DEFAULT_MAX_BLOB_SIZE),
            public_base_url: env_string("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.node.id.is_empty() {
            return Err(ConfigError::ValidationError(
                "NODE_ID cannot be empty".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        match (&self.auth.service_url, self.auth.static_tokens.is_empty()) {
            (None, true) => {
                return Err(ConfigError::ValidationError(
                    "one of AUTH_SERVICE_URL or AUTH_STATIC_TOKENS is required".to_string(),
                ))
            }
            (Some(_), false) => {
                return Err(ConfigError::ValidationError(
                    "AUTH_SERVICE_URL and AUTH_STATIC_TOKENS are mutually exclusive".to_string(),
                ))
            }
            _ => {}
        }

        if self.auth.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "AUTH_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        // Blobs live on the disk of the node that received the upload, so a peer
        // would hold share records whose content it cannot serve or delete.
        if !self.is_single_node() {
            return Err(ConfigError::ValidationError(
                "PEERS and DISCOVERY_DNS_NAME need a shared blob backend; \
                 the local backend only supports a single node"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Check if running in single-node mode.
    pub fn is_single_node(&self) -> bool {
        self.cluster.peers.is_empty() && self.cluster.discovery.dns_name.is_none()
    }
}

/// Non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Environment variable parsed as `T`, falling back to `default` when unset or invalid
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_string(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse `token:user_id:username` entries separated by commas.
fn parse_static_tokens(raw: &str) -> Result<Vec<StaticToken>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(token), Some(user_id), Some(username))
                    if !token.is_empty() && !user_id.is_empty() && !username.is_empty() =>
                {
                    Ok(StaticToken {
                        token: token.to_string(),
                        user_id: user_id.to_string(),
                        username: username.to_string(),
                    })
                }
                _ => Err(ConfigError::ValidationError(format!(
                    "AUTH_STATIC_TOKENS entry '{entry}' must look like token:user_id:username"
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_static_tokens() {
        let tokens = parse_static_tokens("t1:u1:alice, t2:u2:bob ,").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(
            tokens[1],
            StaticToken {
                token: "t2".to_string(),
                user_id: "u2".to_string(),
                username: "bob".to_string(),
            }
        );
    }

    fn valid_config() -> Config {
        Config {
            auth: AuthConfig {
                static_tokens: parse_static_tokens("t1:u1:alice").unwrap(),
                ..Default::default()
            },
            cluster: ClusterConfig::default(),
            node: NodeConfig {
                bind_address: "127.0.0.1:0".to_string(),
                data_dir: "./data".to_string(),
                id: "node-1".to_string(),
            },
            storage: StorageConfig::default(),
            max_upload_size: DEFAULT_MAX_BLOB_SIZE,
            public_base_url: None,
        }
    }

    #[test]
    fn test_validate_accepts_single_node() {
        let config = valid_config();
        assert!(config.is_single_node());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_peers_with_local_blobs() {
        let mut config = valid_config();
        config.cluster.peers = vec!["node-2:8080".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("PEERS")
        ));

        let mut config = valid_config();
        config.cluster.discovery.dns_name = Some("share-drop.svc".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_auth_timeout() {
        let mut config = valid_config();
        config.auth.timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("AUTH_TIMEOUT_MS")
        ));
    }

    #[test]
    fn test_validate_requires_exactly_one_auth_mode() {
        let mut config = valid_config();
        config.auth.static_tokens.clear();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.auth.service_url = Some("http://users.local".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_static_tokens_rejects_malformed() {
        assert!(parse_static_tokens("t1:u1").is_err());
        assert!(parse_static_tokens("t1::alice").is_err());
    }
}
