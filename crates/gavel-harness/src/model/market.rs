//! Reference market.
//!
//! A single-copy, obviously correct rendition of the auction rules. The
//! replicated system, whatever its internal divergence, must answer every
//! operation exactly as this model does when no faults are injected.

use std::collections::BTreeMap;

use gavel_proto::{AuctionError, AuctionId, ClientId, Role};

use super::operation::{
    ListingSummary, Operation, OperationResult, OperationValue, UserIndex, slot_auction_id,
    user_name, user_role,
};

#[derive(Debug, Clone)]
struct ModelAuction {
    owner: UserIndex,
    start: f64,
    reserve: f64,
    bids: Vec<(UserIndex, f64)>,
    live: bool,
}

impl ModelAuction {
    fn highest(&self) -> Option<(UserIndex, f64)> {
        self.bids.iter().copied().reduce(|best, bid| if bid.1 > best.1 { bid } else { best })
    }

    fn winner(&self) -> Option<(String, f64)> {
        self.highest()
            .filter(|&(_, amount)| amount >= self.reserve)
            .map(|(user, amount)| (user_name(user), amount))
    }
}

/// Model market - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelMarket {
    users: BTreeMap<UserIndex, ClientId>,
    auctions: BTreeMap<AuctionId, ModelAuction>,
    next_client_id: ClientId,
    next_auction_id: AuctionId,
}

impl Default for ModelMarket {
    fn default() -> Self {
        Self { users: BTreeMap::new(), auctions: BTreeMap::new(), next_client_id: 1, next_auction_id: 1 }
    }
}

impl ModelMarket {
    /// Create an empty market.
    pub fn new() -> Self {
        Self::default()
    }

    /// Client id of a registered pool member.
    pub fn client_id(&self, user: UserIndex) -> Option<ClientId> {
        self.users.get(&normalize(user)).copied()
    }

    /// Number of auctions ever created.
    pub fn auction_count(&self) -> usize {
        self.auctions.len()
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Register { user } => self.register(normalize(user)),
            Operation::CreateAuction { user, start, reserve } => {
                self.create(normalize(user), f64::from(start), f64::from(reserve))
            },
            Operation::Bid { user, auction, amount } => {
                self.bid(normalize(user), slot_auction_id(auction), f64::from(amount))
            },
            Operation::Close { user, auction } => self.close(normalize(user), slot_auction_id(auction)),
            Operation::Browse => Ok(OperationValue::Listings(self.listings())),
        }
    }

    fn register(&mut self, user: UserIndex) -> OperationResult {
        if self.users.contains_key(&user) {
            return Err(AuctionError::Conflict);
        }
        let id = self.next_client_id;
        self.next_client_id += 1;
        self.users.insert(user, id);
        Ok(OperationValue::Registered(id))
    }

    fn create(&mut self, user: UserIndex, start: f64, reserve: f64) -> OperationResult {
        if user_role(user) != Role::Seller {
            return Err(AuctionError::NotSeller);
        }
        if !self.users.contains_key(&user) {
            return Err(AuctionError::UnknownUser);
        }
        let id = self.next_auction_id;
        self.next_auction_id += 1;
        self.auctions
            .insert(id, ModelAuction { owner: user, start, reserve, bids: Vec::new(), live: true });
        Ok(OperationValue::Created(id))
    }

    fn bid(&mut self, user: UserIndex, id: AuctionId, amount: f64) -> OperationResult {
        if user_role(user) != Role::Buyer {
            return Err(AuctionError::NotBuyer);
        }
        let registered = self.users.contains_key(&user);
        let auction = self.auctions.get_mut(&id).ok_or(AuctionError::AuctionNotFound(id))?;
        if !registered {
            return Err(AuctionError::UnknownUser);
        }
        if amount <= 0.0 {
            return Err(AuctionError::InvalidAmount);
        }
        if !auction.live {
            return Err(AuctionError::AuctionClosed);
        }
        match auction.highest() {
            None if amount <= auction.start => return Err(AuctionError::BelowStartingPrice),
            Some((_, best)) if amount <= best => return Err(AuctionError::BelowHighestBid),
            _ => {},
        }
        auction.bids.push((user, amount));
        Ok(OperationValue::BidPlaced)
    }

    fn close(&mut self, user: UserIndex, id: AuctionId) -> OperationResult {
        let registered = self.users.contains_key(&user);
        let auction = self.auctions.get_mut(&id).ok_or(AuctionError::AuctionNotFound(id))?;
        if !registered || auction.owner != user {
            return Err(AuctionError::NotOwner);
        }
        auction.live = false;
        Ok(OperationValue::Closed(auction.winner()))
    }

    /// Every listing in id order.
    pub fn listings(&self) -> Vec<ListingSummary> {
        self.auctions
            .iter()
            .map(|(&auction_id, a)| ListingSummary {
                auction_id,
                owner: user_name(a.owner),
                is_live: a.live,
                highest: a.highest().map(|(_, amount)| amount),
            })
            .collect()
    }
}

fn normalize(user: UserIndex) -> UserIndex {
    user % super::operation::USER_POOL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_winner() {
        let mut market = ModelMarket::new();
        market.apply(&Operation::Register { user: 0 }).unwrap();
        market.apply(&Operation::Register { user: 1 }).unwrap();

        assert_eq!(
            market.apply(&Operation::CreateAuction { user: 0, start: 50, reserve: 80 }),
            Ok(OperationValue::Created(1))
        );
        assert!(market.apply(&Operation::Bid { user: 1, auction: 0, amount: 60 }).is_ok());
        assert!(market.apply(&Operation::Bid { user: 1, auction: 0, amount: 90 }).is_ok());
        assert_eq!(
            market.apply(&Operation::Close { user: 0, auction: 0 }),
            Ok(OperationValue::Closed(Some(("user1".into(), 90.0))))
        );
        assert_eq!(
            market.apply(&Operation::Bid { user: 1, auction: 0, amount: 100 }),
            Err(AuctionError::AuctionClosed)
        );
    }

    #[test]
    fn unregistered_requester_is_not_owner() {
        let mut market = ModelMarket::new();
        market.apply(&Operation::Register { user: 0 }).unwrap();
        market.apply(&Operation::CreateAuction { user: 0, start: 1, reserve: 1 }).unwrap();

        assert_eq!(
            market.apply(&Operation::Close { user: 2, auction: 0 }),
            Err(AuctionError::NotOwner)
        );
    }
}
