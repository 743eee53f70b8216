//! Error and outcome types.
//!
//! `AuctionError` is not a transport error: it is the rejection half of an
//! operation's reply, computed independently by every replica. It is
//! serializable and compared by value so the coordinator can vote on it, and
//! its `Display` text is the message shown to the end user.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::AuctionId;

/// Result of a replicated auction operation.
pub type Outcome<T> = Result<T, AuctionError>;

/// Rejections produced by the auction state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum AuctionError {
    /// Username or email is already registered.
    #[error("User with that username or email address already exists.")]
    Conflict,

    /// Username or email is malformed.
    #[error("Invalid account details: {reason}.")]
    InvalidAccount {
        /// What was wrong with the account.
        reason: String,
    },

    /// The per-user secret could not be handed to the key store.
    #[error("Account could not be registered: secret provisioning failed.")]
    KeyProvisioning,

    /// The replica had no randomness to draw a challenge from.
    #[error("Challenge could not be issued, please try again.")]
    ChallengeUnavailable,

    /// No account with that username, or the account presented does not
    /// match the registered one.
    #[error("User doesn't exist.")]
    UnknownUser,

    /// Challenge-response authentication failed.
    ///
    /// Deliberately carries no detail about which step failed.
    #[error("Authentication failed.")]
    Unauthorized,

    /// Only sellers may list items.
    #[error("You do not have the correct privileges to create an auction.")]
    NotSeller,

    /// Only buyers may bid.
    #[error("You do not have the correct privileges to make a bid.")]
    NotBuyer,

    /// Only the owner may close a listing.
    #[error("You are not authorised to close this auction.")]
    NotOwner,

    /// No listing with that id.
    #[error("Item {0} does not exist.")]
    AuctionNotFound(AuctionId),

    /// Listing name or prices are unusable.
    #[error("Invalid listing: {reason}.")]
    InvalidListing {
        /// What was wrong with the listing.
        reason: String,
    },

    /// Bid amount is not a positive, finite number.
    #[error("Bid not registered as the amount must be a positive number.")]
    InvalidAmount,

    /// First bid did not exceed the starting price.
    #[error("Bid not registered as it is lower than the starting price.")]
    BelowStartingPrice,

    /// Bid did not exceed the current highest bid.
    #[error("Bid not registered as it is lower than the current highest bid.")]
    BelowHighestBid,

    /// Listing has been closed.
    #[error("This auction is closed.")]
    AuctionClosed,
}

/// Failures of the client-facing service itself, as opposed to rejections
/// decided by the replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ServiceError {
    /// No replica answered within the broadcast deadline.
    #[error("Error")]
    Unavailable,

    /// The call acts on behalf of an account this session has not
    /// authenticated as.
    #[error("You must log in as this account first.")]
    NotAuthenticated,
}

/// Frame encoding and decoding errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame length prefix exceeds the allowed maximum.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Declared payload size.
        size: usize,
        /// Maximum accepted payload size.
        max: usize,
    },

    /// CBOR serialization failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// CBOR deserialization failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// Peer closed the stream in the middle of a frame.
    #[error("connection closed mid-frame ({buffered} bytes buffered)")]
    Truncated {
        /// Bytes received before the stream ended.
        buffered: usize,
    },

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_message_mentions_closure() {
        assert!(AuctionError::AuctionClosed.to_string().contains("auction is closed"));
    }

    #[test]
    fn unavailable_is_generic() {
        assert_eq!(ServiceError::Unavailable.to_string(), "Error");
    }

    #[test]
    fn error_display() {
        let err = ProtocolError::FrameTooLarge { size: 10, max: 4 };
        assert_eq!(err.to_string(), "frame too large: 10 bytes (max 4)");
    }
}
