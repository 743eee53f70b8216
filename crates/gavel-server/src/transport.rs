//! Broadcast transport boundary.
//!
//! The replicas form a group. A [`Transport`] gives one member a view of the
//! group and lets it broadcast a [`ReplicaRequest`] to every other member, or
//! call one member directly, with a bounded wait. Per-member failures are
//! ordinary values in the result; nothing here retries.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use gavel_proto::{ReplicaRequest, ReplicaResponse};
use thiserror::Error;

/// Address of a group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replica-{}", self.0)
    }
}

/// Why a member produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The member did not answer within the deadline.
    #[error("timed out")]
    Timeout,

    /// The member is not in the current view.
    #[error("unknown member")]
    UnknownMember,

    /// The member left or its handler went away mid-call.
    #[error("member unreachable")]
    Unreachable,
}

/// Per-member results of a broadcast, ordered by member id.
pub type Responses = Vec<(MemberId, Result<ReplicaResponse, TransportError>)>;

/// Group transport as seen by one member.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// This member's id, or `None` for an observer that is not itself a
    /// replica (the coordinator).
    fn local_id(&self) -> Option<MemberId>;

    /// Current membership view, including this member.
    fn members(&self) -> Vec<MemberId>;

    /// Send `request` to every member except this one, waiting at most
    /// `timeout` for all answers.
    async fn broadcast(&self, request: ReplicaRequest, timeout: Duration) -> Responses;

    /// Send `request` to a single member.
    async fn call(
        &self,
        member: MemberId,
        request: ReplicaRequest,
        timeout: Duration,
    ) -> Result<ReplicaResponse, TransportError>;
}

/// Receives requests addressed to a member.
#[async_trait]
pub trait ReplicaHandler: Send + Sync + 'static {
    /// Handle one request.
    async fn handle(&self, request: ReplicaRequest) -> ReplicaResponse;
}
