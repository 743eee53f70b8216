//! Gavel wire protocol.
//!
//! Domain types, RPC messages and the frame codec shared by the replicas, the
//! coordinator and clients.
//!
//! # Components
//!
//! - [`types`]: accounts, bids, listings and the replica state snapshot
//! - [`messages`]: client calls, replica requests and their replies
//! - [`error`]: the rejection taxonomy returned to callers
//! - [`codec`]: length-prefixed CBOR frames

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;

pub use codec::{MAX_FRAME_SIZE, decode_frame, encode_frame, read_frame, write_frame};
pub use error::{AuctionError, Outcome, ProtocolError, ServiceError};
pub use messages::{Call, ClientResponse, Reply, ReplicaRequest, ReplicaResponse};
pub use types::{
    AuctionId, AuctionItem, Bid, Challenge, ChallengeProof, ChallengeTable, ClientId,
    CloseOutcome, ReplicaState, Role, UserAccount,
};
