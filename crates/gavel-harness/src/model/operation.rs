//! Operations for model-based testing.
//!
//! Operations are generated randomly by proptest (or `arbitrary` when
//! fuzzing) and applied to both the model and the replicated system.

use arbitrary::Arbitrary;
use gavel_proto::{AuctionError, AuctionId, ClientId, Role};

/// Index into the fixed user pool.
pub type UserIndex = u8;

/// Size of the user pool.
pub const USER_POOL: u8 = 6;

/// Number of distinct auction ids operations address.
pub const AUCTION_SLOTS: u8 = 4;

/// Username of a pool member.
pub fn user_name(user: UserIndex) -> String {
    format!("user{}", user % USER_POOL)
}

/// Role of a pool member: even indices sell, odd indices buy.
pub fn user_role(user: UserIndex) -> Role {
    if (user % USER_POOL) % 2 == 0 { Role::Seller } else { Role::Buyer }
}

/// Operations that can be applied to the system.
///
/// Small integer fields keep the interesting collisions (same user, same
/// auction, equal amounts) likely.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Register a pool member.
    Register {
        /// Who registers.
        user: UserIndex,
    },

    /// List an item.
    CreateAuction {
        /// Seller (or not).
        user: UserIndex,
        /// Starting price.
        start: u8,
        /// Reserve price.
        reserve: u8,
    },

    /// Bid on an auction slot.
    Bid {
        /// Bidder.
        user: UserIndex,
        /// Auction slot.
        auction: u8,
        /// Whole-pound amount.
        amount: u8,
    },

    /// Close an auction slot.
    Close {
        /// Requester.
        user: UserIndex,
        /// Auction slot.
        auction: u8,
    },

    /// List everything.
    Browse,
}

/// Auction id addressed by a slot.
pub fn slot_auction_id(slot: u8) -> AuctionId {
    AuctionId::from(slot % AUCTION_SLOTS) + 1
}

/// One row of a browse result.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSummary {
    /// Auction id.
    pub auction_id: AuctionId,
    /// Owner's username.
    pub owner: String,
    /// Still accepting bids.
    pub is_live: bool,
    /// Highest accepted amount.
    pub highest: Option<f64>,
}

/// Observable success value of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationValue {
    /// Assigned client id.
    Registered(ClientId),
    /// Assigned auction id.
    Created(AuctionId),
    /// Bid accepted.
    BidPlaced,
    /// Winner username and amount, or `None` if the reserve was not met.
    Closed(Option<(String, f64)>),
    /// Every listing.
    Listings(Vec<ListingSummary>),
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
pub type OperationResult = Result<OperationValue, AuctionError>;
