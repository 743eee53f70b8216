//! A single replica under concurrent load.
//!
//! Every call runs on its own task of a multi-threaded runtime, so the state
//! mutex is the only thing keeping ids unique and bids ordered.

use std::{sync::Arc, time::Duration};

use gavel_core::{AuctionState, MemoryKeyStore};
use gavel_proto::{AuctionError, AuctionItem, Bid, Call, Reply, Role, UserAccount};
use gavel_server::{LocalGroup, LocalTransport, MemberId, ReplicaNode, SystemEnv};
use tokio::task::JoinSet;

type Node = ReplicaNode<SystemEnv, LocalTransport>;

fn node() -> Arc<Node> {
    let state = AuctionState::new(SystemEnv::new(), Arc::new(MemoryKeyStore::new()));
    let transport = LocalGroup::new().transport(Some(MemberId(1)));
    Arc::new(ReplicaNode::new(MemberId(1), state, transport, Duration::from_secs(2)))
}

async fn register(node: &Node, name: &str, role: Role) -> UserAccount {
    let user = UserAccount::new(name, format!("{name}@hotmail.com"), role);
    match node.apply(Call::Register(user.clone())).await {
        Reply::Registered(Ok(client_id)) => UserAccount { client_id, ..user },
        other => panic!("registration failed: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_distinct_consecutive_ids() {
    let node = node();
    let tom = register(&node, "tom", Role::Seller).await;

    let mut tasks = JoinSet::new();
    for n in 0..32 {
        let (node, tom) = (node.clone(), tom.clone());
        tasks.spawn(async move {
            let item = AuctionItem::new(tom, format!("Lot {n}"), "", false, 1.0, 1.0);
            node.apply(Call::CreateAuction(item)).await
        });
    }

    let mut ids = Vec::new();
    while let Some(reply) = tasks.join_next().await {
        match reply.unwrap() {
            Reply::Created(Ok(id)) => ids.push(id),
            other => panic!("create failed: {other:?}"),
        }
    }
    ids.sort_unstable();

    assert_eq!(ids, (1..=32).collect::<Vec<_>>());
    assert_eq!(node.snapshot().await.next_auction_id, 33);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bids_never_accept_a_lower_amount() {
    let node = node();
    let tom = register(&node, "tom", Role::Seller).await;
    let max = register(&node, "max", Role::Buyer).await;

    let item = AuctionItem::new(tom, "Clock", "", false, 0.0, 0.0);
    let Reply::Created(Ok(id)) = node.apply(Call::CreateAuction(item)).await else {
        panic!("listing was not created");
    };

    let mut tasks = JoinSet::new();
    for amount in 1..=50 {
        let (node, max) = (node.clone(), max.clone());
        tasks.spawn(async move {
            let bid = Bid::new(max, f64::from(amount));
            node.apply(Call::BidOnItem { auction_id: id, bid }).await
        });
    }

    let mut accepted = 0;
    while let Some(reply) = tasks.join_next().await {
        match reply.unwrap() {
            Reply::BidPlaced(Ok(())) => accepted += 1,
            Reply::BidPlaced(Err(AuctionError::BelowHighestBid)) => {},
            other => panic!("unexpected bid reply: {other:?}"),
        }
    }

    let bids = node.snapshot().await.listings[&id].bids.clone();
    assert_eq!(bids.len(), accepted);
    assert!(bids.windows(2).all(|w| w[0].amount < w[1].amount));
    assert_eq!(bids.last().map(|b| b.amount), Some(50.0));
}
