//! Reference model for model-based testing.
//!
//! The model is a simplified implementation that captures the auction rules
//! without replication, authentication or networking. It serves as the oracle
//! against which the replicated system is verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Rules not mechanism: Captures WHAT, not HOW
//! - Deterministic: Same inputs produce same outputs

mod market;
pub mod operation;

pub use market::ModelMarket;
pub use operation::{
    AUCTION_SLOTS, ListingSummary, Operation, OperationResult, OperationValue, USER_POOL,
    UserIndex, slot_auction_id, user_name, user_role,
};
