//! Translation between model operations and real calls.
//!
//! The real system knows accounts by their full registered value, which the
//! driver learns from registration replies. Replies are reduced to the same
//! [`OperationResult`] the model produces so the two can be compared.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use gavel_core::{KeyStore, MemoryKeyStore};
use gavel_proto::{AuctionItem, Bid, Call, CloseOutcome, Reply, UserAccount};
use gavel_server::{Cluster, ClusterConfig};

use crate::{
    model::{
        ListingSummary, Operation, OperationResult, OperationValue, UserIndex, slot_auction_id,
        user_name, user_role,
    },
    sim_env::SimEnv,
};

/// Accounts the real system has registered, by pool index.
#[derive(Debug, Clone, Default)]
pub struct Driver {
    accounts: BTreeMap<UserIndex, UserAccount>,
}

impl Driver {
    /// Create a driver with no known accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registered account for `user`, or an unregistered one.
    pub fn account(&self, user: UserIndex) -> UserAccount {
        let user = user % crate::model::USER_POOL;
        self.accounts.get(&user).cloned().unwrap_or_else(|| {
            let name = user_name(user);
            let email = format!("{name}@example.com");
            UserAccount::new(name, email, user_role(user))
        })
    }

    /// The call that performs `op`.
    pub fn call(&self, op: &Operation) -> Call {
        match *op {
            Operation::Register { user } => Call::Register(self.account(user)),
            Operation::CreateAuction { user, start, reserve } => {
                Call::CreateAuction(AuctionItem::new(
                    self.account(user),
                    "item",
                    "generated",
                    true,
                    f64::from(start),
                    f64::from(reserve),
                ))
            },
            Operation::Bid { user, auction, amount } => Call::BidOnItem {
                auction_id: slot_auction_id(auction),
                bid: Bid::new(self.account(user), f64::from(amount)),
            },
            Operation::Close { user, auction } => {
                Call::CloseAuction { auction_id: slot_auction_id(auction), requester: self.account(user) }
            },
            Operation::Browse => Call::BrowseAuctions,
        }
    }

    /// Reduce the reply to `op` to an observable result.
    ///
    /// Returns `None` for authentication replies, which no operation
    /// produces.
    pub fn observe(&mut self, op: &Operation, reply: Reply) -> Option<OperationResult> {
        let result = match reply {
            Reply::Registered(outcome) => outcome.map(|client_id| {
                if let Operation::Register { user } = *op {
                    let account = UserAccount { client_id, ..self.account(user) };
                    self.accounts.insert(user % crate::model::USER_POOL, account);
                }
                OperationValue::Registered(client_id)
            }),
            Reply::Created(outcome) => outcome.map(OperationValue::Created),
            Reply::BidPlaced(outcome) => outcome.map(|()| OperationValue::BidPlaced),
            Reply::Closed(outcome) => outcome.map(|closed| {
                OperationValue::Closed(match closed {
                    CloseOutcome::Winner { bidder, amount, .. } => Some((bidder.username, amount)),
                    CloseOutcome::ReserveNotMet { .. } => None,
                })
            }),
            Reply::Listings(items) => Ok(OperationValue::Listings(
                items
                    .into_iter()
                    .map(|item| ListingSummary {
                        auction_id: item.auction_id,
                        is_live: item.is_live,
                        highest: item.highest_bid().map(|bid| bid.amount),
                        owner: item.owner.username,
                    })
                    .collect(),
            )),
            Reply::Challenge(_) | Reply::Validated(_) => return None,
        };
        Some(result)
    }
}

/// A cluster with no seed users, seeded RNG and an in-memory key store.
pub async fn sim_cluster(seed: u64, replicas: usize) -> (Cluster<SimEnv>, MemoryKeyStore) {
    let keys = MemoryKeyStore::new();
    let config = ClusterConfig {
        replicas,
        broadcast_timeout: Duration::from_millis(2000),
        seed_users: Vec::new(),
    };
    let shared: Arc<dyn KeyStore> = Arc::new(keys.clone());
    let cluster = Cluster::start(config, SimEnv::with_seed(seed), shared).await;
    (cluster, keys)
}
