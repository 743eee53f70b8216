//! Replica coordinator.
//!
//! Turns each client call into a broadcast to the replica group and votes on
//! the answers:
//!
//! ```text
//! call ──► broadcast(Call) ──► replies ──► compare_responses
//!                                              │
//!                     minority ◄── Resync ─────┤
//!                                              ▼
//!                                        majority reply
//! ```
//!
//! Replicas decide their own outcomes; the coordinator only aggregates
//! replies it has already received and never mutates replica state itself.
//!
//! # Known hazard
//!
//! A replica whose reply differs from the majority is resynced with a full
//! snapshot, even if it differed only because it raced a concurrent call. Its
//! legitimately newer state can be replaced by an older majority snapshot.
//! Without a log or ordering layer there is no way to tell the two cases
//! apart.

use std::time::Duration;

use gavel_core::compare_responses;
use gavel_proto::{
    AuctionId, AuctionItem, Bid, Call, Challenge, ChallengeProof, ClientId, ClientResponse,
    CloseOutcome, Outcome, Reply, ReplicaRequest, ReplicaResponse, ServiceError, UserAccount,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::transport::{MemberId, Transport};

/// Default bound on every broadcast.
pub const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_millis(2000);

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a broadcast waits for replies.
    pub broadcast_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT }
    }
}

/// Coordinator failures. Surfaced to clients as [`ServiceError::Unavailable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// No replica answered within the deadline.
    #[error("no replica responded to {op}")]
    NoResponse {
        /// Operation name.
        op: &'static str,
    },

    /// The winning reply does not belong to the operation.
    #[error("unexpected reply to {op}")]
    UnexpectedResponse {
        /// Operation name.
        op: &'static str,
    },
}

/// Front end to the replica group.
pub struct Coordinator<T: Transport> {
    transport: T,
    config: CoordinatorConfig,
}

impl<T: Transport> Coordinator<T> {
    /// Create a coordinator over `transport`.
    pub fn new(transport: T, config: CoordinatorConfig) -> Self {
        Self { transport, config }
    }

    /// Current replica view.
    pub fn members(&self) -> Vec<MemberId> {
        self.transport.members()
    }

    /// Run a call and convert coordinator failures into the client-facing
    /// generic error.
    pub async fn handle(&self, call: Call) -> ClientResponse {
        let op = call.name();
        self.execute(call).await.map_err(|e| {
            error!(op, error = %e, "call failed");
            ServiceError::Unavailable
        })
    }

    /// Run a call against the group.
    pub async fn execute(&self, call: Call) -> Result<Reply, CoordinatorError> {
        match call {
            Call::GetChallenge { .. } => self.first_reply(call).await,
            _ => self.replicated(call).await,
        }
    }

    /// Register an account.
    pub async fn register(&self, user: UserAccount) -> Result<Outcome<ClientId>, CoordinatorError> {
        match self.execute(Call::Register(user)).await? {
            Reply::Registered(outcome) => Ok(outcome),
            _ => Err(CoordinatorError::UnexpectedResponse { op: "register" }),
        }
    }

    /// Issue a challenge for `username`.
    pub async fn get_challenge(&self, username: &str) -> Result<Outcome<Challenge>, CoordinatorError> {
        match self.execute(Call::GetChallenge { username: username.to_string() }).await? {
            Reply::Challenge(outcome) => Ok(outcome),
            _ => Err(CoordinatorError::UnexpectedResponse { op: "getChallenge" }),
        }
    }

    /// Validate a challenge proof.
    pub async fn validate_challenge(
        &self,
        proof: ChallengeProof,
        username: &str,
    ) -> Result<Outcome<UserAccount>, CoordinatorError> {
        let call = Call::ValidateChallenge { proof, username: username.to_string() };
        match self.execute(call).await? {
            Reply::Validated(outcome) => Ok(outcome),
            _ => Err(CoordinatorError::UnexpectedResponse { op: "validateChallenge" }),
        }
    }

    /// List an item.
    pub async fn create_auction(
        &self,
        item: AuctionItem,
    ) -> Result<Outcome<AuctionId>, CoordinatorError> {
        match self.execute(Call::CreateAuction(item)).await? {
            Reply::Created(outcome) => Ok(outcome),
            _ => Err(CoordinatorError::UnexpectedResponse { op: "createAuction" }),
        }
    }

    /// Close a listing.
    pub async fn close_auction(
        &self,
        auction_id: AuctionId,
        requester: UserAccount,
    ) -> Result<Outcome<CloseOutcome>, CoordinatorError> {
        match self.execute(Call::CloseAuction { auction_id, requester }).await? {
            Reply::Closed(outcome) => Ok(outcome),
            _ => Err(CoordinatorError::UnexpectedResponse { op: "closeAuction" }),
        }
    }

    /// Bid on a listing.
    pub async fn bid_on_item(
        &self,
        auction_id: AuctionId,
        bid: Bid,
    ) -> Result<Outcome<()>, CoordinatorError> {
        match self.execute(Call::BidOnItem { auction_id, bid }).await? {
            Reply::BidPlaced(outcome) => Ok(outcome),
            _ => Err(CoordinatorError::UnexpectedResponse { op: "bidOnItem" }),
        }
    }

    /// List every auction.
    pub async fn browse_auctions(&self) -> Result<Vec<AuctionItem>, CoordinatorError> {
        match self.execute(Call::BrowseAuctions).await? {
            Reply::Listings(items) => Ok(items),
            _ => Err(CoordinatorError::UnexpectedResponse { op: "browseAuctions" }),
        }
    }

    async fn broadcast_call(&self, call: Call) -> Vec<(MemberId, Reply)> {
        let op = call.name();
        let responses =
            self.transport.broadcast(ReplicaRequest::Call(call), self.config.broadcast_timeout).await;

        let mut replies = Vec::with_capacity(responses.len());
        for (member, response) in responses {
            match response {
                Ok(ReplicaResponse::Reply(reply)) => replies.push((member, reply)),
                Ok(other) => warn!(op, member = %member, ?other, "non-reply response"),
                Err(e) => debug!(op, member = %member, error = %e, "no reply"),
            }
        }
        replies
    }

    /// Majority rule: vote, resync dissenters, return the winner.
    async fn replicated(&self, call: Call) -> Result<Reply, CoordinatorError> {
        let op = call.name();
        let replies = self.broadcast_call(call).await;
        let reconciled = compare_responses(replies).ok_or(CoordinatorError::NoResponse { op })?;

        if !reconciled.unanimous {
            warn!(op, minority = ?reconciled.minority, "replicas diverged");
            self.resync_members(&reconciled.minority).await;
        }
        Ok(reconciled.value)
    }

    /// Challenge tokens are random per replica, so replies always differ.
    /// The first reply wins and only that user's challenge is pushed to the
    /// whole group. Outstanding challenges of other users are left alone, so
    /// concurrent logins cannot overwrite each other.
    async fn first_reply(&self, call: Call) -> Result<Reply, CoordinatorError> {
        let op = call.name();
        let username = match &call {
            Call::GetChallenge { username } => username.clone(),
            _ => return Err(CoordinatorError::UnexpectedResponse { op }),
        };
        let (source, reply) = self
            .broadcast_call(call)
            .await
            .into_iter()
            .next()
            .ok_or(CoordinatorError::NoResponse { op })?;

        if let Reply::Challenge(Ok(challenge)) = &reply {
            self.adopt_challenge(source, username, challenge.clone()).await;
        }
        Ok(reply)
    }

    async fn adopt_challenge(&self, source: MemberId, username: String, challenge: Challenge) {
        let request = ReplicaRequest::AdoptChallenge { username, challenge };
        let acks = self
            .transport
            .broadcast(request, self.config.broadcast_timeout)
            .await
            .into_iter()
            .filter(|(_, r)| matches!(r, Ok(ReplicaResponse::Ack)))
            .count();

        debug!(source = %source, acks, "challenge propagated");
    }

    /// Ask each member to resync itself. Sequential, one bounded call each;
    /// a resync broadcasts in turn, so allow it two deadlines.
    async fn resync_members(&self, members: &[MemberId]) {
        let timeout = self.config.broadcast_timeout * 2;
        for &member in members {
            match self.transport.call(member, ReplicaRequest::Resync, timeout).await {
                Ok(_) => info!(member = %member, "member resynced"),
                Err(e) => warn!(member = %member, error = %e, "resync failed"),
            }
        }
    }
}
