//! Gavel Core
//!
//! The replicated auction state machine. One [`AuctionState`] lives in each
//! replica; the coordinator votes on their replies with
//! [`compare_responses`] and resyncs replicas that disagree.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ AuctionState<E: Environment>                 │
//! │  users ─ challenges ─ listings ─ counters    │
//! │        │                                     │
//! │        └─ KeyStore (shared secrets)          │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Nothing here performs I/O except [`DirKeyStore`]; networking and timeouts
//! live in the server crate.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod keystore;
pub mod reconcile;
pub mod state;

pub use env::{EntropyError, Environment, TOKEN_ALPHABET};
pub use keystore::{
    DirKeyStore, KeyStore, KeyStoreError, MAX_USERNAME_LEN, MemoryKeyStore, is_valid_username,
};
pub use reconcile::{Reconciled, compare_responses};
pub use state::{AuctionState, CHALLENGE_LEN};
