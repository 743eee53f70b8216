//! A replica: one auction state machine plus the resync protocol.

use std::time::Duration;

use async_trait::async_trait;
use gavel_core::{AuctionState, Environment, compare_responses};
use gavel_proto::{Call, Reply, ReplicaRequest, ReplicaResponse, ReplicaState};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::transport::{MemberId, ReplicaHandler, Transport};

/// Result of a resync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// No peer answered; local state kept as is.
    KeptLocal,
    /// Local state replaced by the peers' majority snapshot.
    Adopted {
        /// Peers that returned a snapshot.
        peers: usize,
        /// Whether all returned snapshots were equal.
        unanimous: bool,
    },
}

/// One member of the replica group.
///
/// The state machine sits behind a single async mutex: every request is
/// applied atomically with respect to every other request on this replica.
pub struct ReplicaNode<E: Environment, T: Transport> {
    id: MemberId,
    state: Mutex<AuctionState<E>>,
    transport: T,
    timeout: Duration,
}

impl<E: Environment, T: Transport> ReplicaNode<E, T> {
    /// Create a replica around `state`. `timeout` bounds resync broadcasts.
    pub fn new(id: MemberId, state: AuctionState<E>, transport: T, timeout: Duration) -> Self {
        Self { id, state: Mutex::new(state), transport, timeout }
    }

    /// This replica's member id.
    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Apply a client call locally.
    pub async fn apply(&self, call: Call) -> Reply {
        let name = call.name();
        let reply = self.state.lock().await.apply(call);
        debug!(member = %self.id, op = name, "applied");
        reply
    }

    /// Copy of the full state.
    pub async fn snapshot(&self) -> ReplicaState {
        self.state.lock().await.snapshot()
    }

    /// Replace the full state.
    pub async fn restore(&self, state: ReplicaState) {
        self.state.lock().await.restore(state);
    }

    /// Pull the group's majority state.
    ///
    /// Asks every other member for a snapshot and adopts the majority value.
    /// If nobody answers this replica is alone and keeps its own state. Safe to
    /// run repeatedly.
    pub async fn resync(&self) -> ResyncOutcome {
        // Not holding the lock here: peers may be resyncing from us.
        let responses = self.transport.broadcast(ReplicaRequest::Snapshot, self.timeout).await;

        let mut snapshots = Vec::with_capacity(responses.len());
        for (member, response) in responses {
            match response {
                Ok(ReplicaResponse::Snapshot(state)) => snapshots.push((member, state)),
                Ok(other) => warn!(member = %member, ?other, "unexpected snapshot response"),
                Err(e) => debug!(member = %member, error = %e, "no snapshot"),
            }
        }

        let peers = snapshots.len();
        let Some(reconciled) = compare_responses(snapshots) else {
            info!(member = %self.id, "no peers answered, keeping local state");
            return ResyncOutcome::KeptLocal;
        };

        if !reconciled.unanimous {
            warn!(member = %self.id, diverged = ?reconciled.minority, "peer snapshots disagree");
        }
        self.restore(reconciled.value).await;

        info!(member = %self.id, peers, "resynced from peers");
        ResyncOutcome::Adopted { peers, unanimous: reconciled.unanimous }
    }
}

#[async_trait]
impl<E: Environment, T: Transport> ReplicaHandler for ReplicaNode<E, T> {
    async fn handle(&self, request: ReplicaRequest) -> ReplicaResponse {
        match request {
            ReplicaRequest::Call(call) => ReplicaResponse::Reply(self.apply(call).await),
            ReplicaRequest::Snapshot => ReplicaResponse::Snapshot(self.snapshot().await),
            ReplicaRequest::Resync => {
                self.resync().await;
                ReplicaResponse::Ack
            },
            ReplicaRequest::AdoptChallenge { username, challenge } => {
                if let Err(e) = self.state.lock().await.adopt_challenge(&username, challenge) {
                    warn!(member = %self.id, error = %e, "challenge not adopted");
                }
                ReplicaResponse::Ack
            },
        }
    }
}
