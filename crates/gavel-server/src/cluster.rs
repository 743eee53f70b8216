//! In-process replica group bootstrap.

use std::sync::Arc;

use gavel_core::{AuctionState, Environment, KeyStore};
use gavel_proto::{Call, Reply};
use tracing::{info, warn};

use crate::{
    config::ClusterConfig,
    coordinator::Coordinator,
    local::{LocalGroup, LocalTransport},
    replica_node::{ReplicaNode, ResyncOutcome},
    transport::MemberId,
};

/// Replica running on the in-process group.
pub type LocalReplica<E> = ReplicaNode<E, LocalTransport>;

/// A replica group plus its coordinator.
pub struct Cluster<E: Environment> {
    config: ClusterConfig,
    env: E,
    keys: Arc<dyn KeyStore>,
    group: LocalGroup,
    replicas: Vec<Arc<LocalReplica<E>>>,
    coordinator: Arc<Coordinator<LocalTransport>>,
    next_id: u64,
}

impl<E: Environment> Cluster<E> {
    /// Start `config.replicas` replicas, one after another.
    pub async fn start(config: ClusterConfig, env: E, keys: Arc<dyn KeyStore>) -> Self {
        let group = LocalGroup::new();
        let coordinator = Arc::new(Coordinator::new(group.transport(None), config.coordinator()));

        let mut cluster = Self {
            config,
            env,
            keys,
            group,
            replicas: Vec::new(),
            coordinator,
            next_id: 1,
        };
        for _ in 0..cluster.config.replicas {
            cluster.add_replica().await;
        }

        info!(replicas = cluster.replicas.len(), "cluster started");
        cluster
    }

    /// Start a fresh replica: seed the default users, join the group, then
    /// pull the group's state.
    pub async fn add_replica(&mut self) -> Arc<LocalReplica<E>> {
        let id = MemberId(self.next_id);
        self.next_id += 1;

        let replica = Arc::new(ReplicaNode::new(
            id,
            AuctionState::new(self.env.clone(), Arc::clone(&self.keys)),
            self.group.transport(Some(id)),
            self.config.broadcast_timeout,
        ));

        for user in &self.config.seed_users {
            if let Reply::Registered(Err(e)) = replica.apply(Call::Register(user.clone())).await {
                warn!(member = %id, username = %user.username, error = %e, "seed user rejected");
            }
        }

        self.group.join(id, Arc::clone(&replica) as _);
        if replica.resync().await == ResyncOutcome::KeptLocal {
            info!(member = %id, "first member of the group");
        }

        self.replicas.push(Arc::clone(&replica));
        replica
    }

    /// Rejoin a replica that previously left or was suspected, then resync it.
    pub async fn rejoin(&self, id: MemberId) -> Option<ResyncOutcome> {
        let replica = self.replica(id)?;
        self.group.join(id, Arc::clone(&replica) as _);
        Some(replica.resync().await)
    }

    /// Coordinator over the whole group.
    pub fn coordinator(&self) -> Arc<Coordinator<LocalTransport>> {
        Arc::clone(&self.coordinator)
    }

    /// Membership control, for fault injection.
    pub fn group(&self) -> &LocalGroup {
        &self.group
    }

    /// Every replica ever started, in start order.
    pub fn replicas(&self) -> &[Arc<LocalReplica<E>>] {
        &self.replicas
    }

    /// Replica by id.
    pub fn replica(&self, id: MemberId) -> Option<Arc<LocalReplica<E>>> {
        self.replicas.iter().find(|r| r.id() == id).cloned()
    }
}
