//! RPC messages.
//!
//! ```text
//! client ── Call ──► coordinator ── ReplicaRequest::Call ──► replicas
//! client ◄─ ClientResponse ── coordinator ◄─ ReplicaResponse::Reply ──
//! ```
//!
//! The remaining `ReplicaRequest` variants are the replica coordination
//! surface: full-state snapshots, resync triggers and challenge adoption.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Outcome, ServiceError},
    types::{
        AuctionId, AuctionItem, Bid, Challenge, ChallengeProof, ClientId, CloseOutcome,
        ReplicaState, UserAccount,
    },
};

/// A client operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Call {
    /// Register a new account.
    Register(UserAccount),
    /// Ask for a fresh authentication challenge.
    GetChallenge {
        /// Account logging in.
        username: String,
    },
    /// Answer a challenge with its encrypted echo.
    ValidateChallenge {
        /// Encrypted challenge.
        proof: ChallengeProof,
        /// Account logging in.
        username: String,
    },
    /// List an item.
    CreateAuction(AuctionItem),
    /// Close a listing.
    CloseAuction {
        /// Listing to close.
        auction_id: AuctionId,
        /// Account asking to close it.
        requester: UserAccount,
    },
    /// Bid on a listing.
    BidOnItem {
        /// Listing to bid on.
        auction_id: AuctionId,
        /// The offer.
        bid: Bid,
    },
    /// List every auction.
    BrowseAuctions,
}

impl Call {
    /// Operation name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::GetChallenge { .. } => "getChallenge",
            Self::ValidateChallenge { .. } => "validateChallenge",
            Self::CreateAuction(_) => "createAuction",
            Self::CloseAuction { .. } => "closeAuction",
            Self::BidOnItem { .. } => "bidOnItem",
            Self::BrowseAuctions => "browseAuctions",
        }
    }

    /// Account the call acts on behalf of, if it needs an authenticated
    /// session.
    pub fn acting_account(&self) -> Option<&UserAccount> {
        match self {
            Self::CreateAuction(item) => Some(&item.owner),
            Self::CloseAuction { requester, .. } => Some(requester),
            Self::BidOnItem { bid, .. } => Some(&bid.bidder),
            Self::Register(_)
            | Self::GetChallenge { .. }
            | Self::ValidateChallenge { .. }
            | Self::BrowseAuctions => None,
        }
    }
}

/// A replica's answer to a [`Call`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Answer to [`Call::Register`].
    Registered(Outcome<ClientId>),
    /// Answer to [`Call::GetChallenge`].
    Challenge(Outcome<Challenge>),
    /// Answer to [`Call::ValidateChallenge`].
    Validated(Outcome<UserAccount>),
    /// Answer to [`Call::CreateAuction`].
    Created(Outcome<AuctionId>),
    /// Answer to [`Call::CloseAuction`].
    Closed(Outcome<CloseOutcome>),
    /// Answer to [`Call::BidOnItem`].
    BidPlaced(Outcome<()>),
    /// Answer to [`Call::BrowseAuctions`].
    Listings(Vec<AuctionItem>),
}

impl Reply {
    /// Human-readable rendering, as shown to the end user.
    pub fn message(&self) -> String {
        fn render<T>(outcome: &Outcome<T>, ok: impl FnOnce(&T) -> String) -> String {
            outcome.as_ref().map_or_else(ToString::to_string, ok)
        }

        match self {
            Self::Registered(o) => render(o, |_| "Account registered.".to_string()),
            Self::Challenge(o) => render(o, |c| c.as_str().to_string()),
            Self::Validated(o) => render(o, |_| "Login Successful.".to_string()),
            Self::Created(o) => render(o, |id| format!("Auction {id} created.")),
            Self::Closed(o) => render(o, ToString::to_string),
            Self::BidPlaced(o) => render(o, |_| "Bid registered.".to_string()),
            Self::Listings(items) => {
                items.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n\n")
            },
        }
    }
}

/// Message sent to a replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicaRequest {
    /// Apply a client operation.
    Call(Call),
    /// Return the full replica state.
    Snapshot,
    /// Replace local state with the majority state of the other members.
    Resync,
    /// Make `challenge` the outstanding challenge for `username`, leaving
    /// every other account's entry alone.
    AdoptChallenge {
        /// Account the challenge was issued to.
        username: String,
        /// The challenge the client was given.
        challenge: Challenge,
    },
}

impl ReplicaRequest {
    /// Request name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Call(call) => call.name(),
            Self::Snapshot => "snapshot",
            Self::Resync => "resync",
            Self::AdoptChallenge { .. } => "adoptChallenge",
        }
    }
}

/// Message returned by a replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicaResponse {
    /// Answer to [`ReplicaRequest::Call`].
    Reply(Reply),
    /// Answer to [`ReplicaRequest::Snapshot`].
    Snapshot(ReplicaState),
    /// Answer to requests with no payload.
    Ack,
}

/// What the client-facing server sends back for each [`Call`].
pub type ClientResponse = Result<Reply, ServiceError>;
