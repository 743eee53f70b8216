//! Server and cluster configuration.

use std::{path::PathBuf, time::Duration};

use gavel_proto::{Role, UserAccount};

use crate::coordinator::{CoordinatorConfig, DEFAULT_BROADCAST_TIMEOUT};

/// Accounts every replica registers on start.
pub fn default_seed_users() -> Vec<UserAccount> {
    [("tom", Role::Seller), ("fred", Role::Seller), ("max", Role::Buyer), ("shaun", Role::Buyer)]
        .into_iter()
        .map(|(name, role)| UserAccount::new(name, format!("{name}@hotmail.com"), role))
        .collect()
}

/// Replica group configuration.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of replicas to start.
    pub replicas: usize,
    /// Bound on every broadcast, for the coordinator and for resync.
    pub broadcast_timeout: Duration,
    /// Accounts registered by each replica before it joins.
    pub seed_users: Vec<UserAccount>,
}

impl ClusterConfig {
    /// Coordinator settings derived from this configuration.
    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig { broadcast_timeout: self.broadcast_timeout }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            replicas: 3,
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
            seed_users: default_seed_users(),
        }
    }
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "127.0.0.1:1099")
    pub bind_address: String,
    /// Replica group settings
    pub cluster: ClusterConfig,
    /// Directory for per-user key files; in-memory when `None`
    pub key_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:1099".to_string(),
            cluster: ClusterConfig::default(),
            key_dir: None,
        }
    }
}
