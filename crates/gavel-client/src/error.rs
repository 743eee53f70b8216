//! Client error types.

use gavel_core::{EntropyError, KeyStoreError};
use gavel_crypto::ProofError;
use gavel_proto::{ProtocolError, ServiceError};
use thiserror::Error;

/// Errors from client operations.
///
/// Rejections decided by the replicas (a low bid, a closed auction) are not
/// errors here; they come back as the `Err` half of an `Outcome`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the server.
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Frame encoding, decoding or I/O failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server closed the connection.
    #[error("server closed the connection")]
    Disconnected,

    /// The service refused or failed the call.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// Server answered with a reply for a different operation.
    #[error("unexpected reply to {op}")]
    UnexpectedReply {
        /// Operation that was sent.
        op: &'static str,
    },

    /// Operation needs a logged-in account.
    #[error("not logged in")]
    NotLoggedIn,

    /// No secret has been provisioned for the account.
    #[error("no key for {username}")]
    MissingKey {
        /// Account logging in.
        username: String,
    },

    /// Reading the secret failed.
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    /// Sealing the challenge failed.
    #[error("proof error: {0}")]
    Proof(#[from] ProofError),

    /// No randomness for the proof nonce.
    #[error("{0}")]
    Entropy(#[from] EntropyError),
}

impl ClientError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors leave the connection unusable.
    /// Transient errors can be retried on the same connection.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Fatal: connection gone or out of step with the server
            Self::Connect(_)
            | Self::Protocol(_)
            | Self::Disconnected
            | Self::UnexpectedReply { .. } => true,

            // Transient: service hiccups and local preconditions
            Self::Service(_)
            | Self::NotLoggedIn
            | Self::MissingKey { .. }
            | Self::KeyStore(_)
            | Self::Proof(_)
            | Self::Entropy(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_transient() {
        let err = ClientError::Service(ServiceError::Unavailable);
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "service error: Error");
    }

    #[test]
    fn disconnect_is_fatal() {
        assert!(ClientError::Disconnected.is_fatal());
        assert!(ClientError::UnexpectedReply { op: "bidOnItem" }.is_fatal());
    }

    #[test]
    fn exhausted_entropy_is_transient() {
        let err = ClientError::from(EntropyError("device busy".to_string()));
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "entropy source unavailable: device busy");
    }

    #[test]
    fn missing_key_display() {
        let err = ClientError::MissingKey { username: "max".to_string() };
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "no key for max");
    }
}
