//! Fuzz target for the replica [`AuctionState`] machine
//!
//! A replica must give the same answer to every call as the reference model,
//! whatever order registrations, listings, bids and closes arrive in.
//!
//! # Strategy
//!
//! - Operation sequences: arbitrary [`Operation`] lists over a small pool of
//!   users and auction slots, so calls collide on the same listings
//! - Role abuse: buyers listing, sellers bidding, strangers closing
//! - Snapshot round trip: the final state is restored into a fresh replica
//!
//! # Invariants
//!
//! - Every reply matches [`ModelMarket`]
//! - Auction ids stay dense from 1
//! - Accepted bids on a listing strictly increase
//! - A restored replica browses identically

#![no_main]

use std::sync::Arc;

use gavel_core::{AuctionState, MemoryKeyStore};
use gavel_harness::{Driver, ModelMarket, Operation, SimEnv};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u64, Vec<Operation>)| {
    let (seed, ops) = input;
    let keys = Arc::new(MemoryKeyStore::new());
    let mut state = AuctionState::new(SimEnv::with_seed(seed), keys.clone());
    let mut model = ModelMarket::new();
    let mut driver = Driver::new();

    for op in &ops {
        let expected = model.apply(op);
        let call = driver.call(op);
        let actual = driver.observe(op, state.apply(call));
        assert_eq!(Some(expected), actual, "divergence on {op:?}");
    }

    let listings = state.browse();
    for (index, item) in listings.iter().enumerate() {
        assert_eq!(item.auction_id, index as u64 + 1, "auction ids not dense");
        for pair in item.bids.windows(2) {
            assert!(pair[0].amount < pair[1].amount, "bids out of order on {}", item.auction_id);
        }
    }

    let mut restored = AuctionState::new(SimEnv::with_seed(seed), keys);
    restored.restore(state.snapshot());
    assert_eq!(restored.browse(), listings);
});
