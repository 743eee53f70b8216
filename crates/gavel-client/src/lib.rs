//! Gavel client.
//!
//! A thin session over one TCP connection to a Gavel server: register, log
//! in with the challenge-response exchange, then browse, list, bid and close.
//!
//! Replica rejections come back as `Outcome` values whose error `Display` is
//! the text to show the user; [`ClientError`] is reserved for failures of the
//! session itself.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;

pub use client::{AuctionClient, Listing};
pub use error::ClientError;
