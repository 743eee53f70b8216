//! Deterministic test harness for the Gavel auction service.
//!
//! Seeded implementation of the `Environment` trait, a reference model of the
//! auction rules, and a driver that replays model operations against the real
//! replicated system.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and real implementation,
//! and their observable results are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
pub mod model;
pub mod sim_env;

pub use driver::{Driver, sim_cluster};
pub use model::{
    ListingSummary, ModelMarket, Operation, OperationResult, OperationValue, UserIndex,
};
pub use sim_env::SimEnv;
