//! Gavel Cryptographic Primitives
//!
//! Proof of possession for the challenge-response login: the client seals
//! the server's plaintext challenge under its shared secret, the replicas
//! open it and compare.
//!
//! # Design
//!
//! All functions in this crate are pure. Random bytes (secrets, nonces) are
//! supplied by the caller, which keeps the crate usable from deterministic
//! simulations with a seeded RNG.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod proof;

pub use proof::{
    NONCE_SIZE, ProofError, SECRET_SIZE, SharedSecret, TAG_SIZE, open_challenge, seal_challenge,
};
