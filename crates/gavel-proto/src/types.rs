//! Domain types shared by replicas, the coordinator and clients.
//!
//! All types compare by value. Two replicas that applied the same sequence of
//! calls hold equal values, which is what the majority vote relies on.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::error::AuctionError;

/// Client identifier assigned on registration. `0` means unassigned.
pub type ClientId = u64;

/// Listing identifier assigned on creation. `0` means unassigned.
pub type AuctionId = u64;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May create and close listings.
    Seller,
    /// May bid on listings.
    Buyer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seller => f.write_str("SELLER"),
            Self::Buyer => f.write_str("BUYER"),
        }
    }
}

/// A registered (or about to be registered) user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserAccount {
    /// Assigned by the state machine; `0` before registration.
    pub client_id: ClientId,
    /// Unique login name.
    pub username: String,
    /// Unique contact address.
    pub email: String,
    /// Seller or buyer.
    pub role: Role,
}

impl UserAccount {
    /// Create an unregistered account.
    pub fn new(username: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self { client_id: 0, username: username.into(), email: email.into(), role }
    }

    /// Whether the account has been assigned a client id.
    pub fn is_registered(&self) -> bool {
        self.client_id != 0
    }
}

/// An offer on a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    /// Buyer placing the bid.
    pub bidder: UserAccount,
    /// Offered amount.
    pub amount: f64,
}

impl Bid {
    /// Create a bid.
    pub fn new(bidder: UserAccount, amount: f64) -> Self {
        Self { bidder, amount }
    }
}

/// Result of closing a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CloseOutcome {
    /// The highest bid met the reserve.
    Winner {
        /// Closed listing.
        auction_id: AuctionId,
        /// Listing name.
        item_name: String,
        /// Winning buyer.
        bidder: UserAccount,
        /// Winning amount.
        amount: f64,
    },
    /// No bids, or the highest bid is below the reserve.
    ReserveNotMet {
        /// Closed listing.
        auction_id: AuctionId,
        /// Listing name.
        item_name: String,
    },
}

impl fmt::Display for CloseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Winner { auction_id, item_name, bidder, amount } => write!(
                f,
                "The winner of auction {auction_id} [{item_name}] is {} [{}] for £{amount:.2}.",
                bidder.username, bidder.email
            ),
            Self::ReserveNotMet { auction_id, item_name } => {
                write!(f, "The reserve for auction {auction_id} [{item_name}] was not met.")
            },
        }
    }
}

/// A listing and its bid history.
///
/// # Invariants
///
/// - `bids` is strictly increasing in `amount`; the last bid is the highest.
/// - Once `is_live` is false it never becomes true again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionItem {
    /// Assigned on creation; `0` before.
    pub auction_id: AuctionId,
    /// Seller who listed the item.
    pub owner: UserAccount,
    /// Item name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Condition flag: new (true) or used (false).
    pub is_new: bool,
    /// The first bid must exceed this.
    pub starting_price: f64,
    /// Minimum winning amount.
    pub reserve_price: f64,
    /// Accepted bids in arrival order.
    pub bids: Vec<Bid>,
    /// Accepting bids.
    pub is_live: bool,
}

impl AuctionItem {
    /// Create an unlisted item.
    pub fn new(
        owner: UserAccount,
        name: impl Into<String>,
        description: impl Into<String>,
        is_new: bool,
        starting_price: f64,
        reserve_price: f64,
    ) -> Self {
        Self {
            auction_id: 0,
            owner,
            name: name.into(),
            description: description.into(),
            is_new,
            starting_price,
            reserve_price,
            bids: Vec::new(),
            is_live: true,
        }
    }

    /// Current highest bid, if any.
    pub fn highest_bid(&self) -> Option<&Bid> {
        self.bids.last()
    }

    /// Apply the listing's bid rule.
    ///
    /// A closed listing rejects everything. The first bid must be strictly
    /// above the starting price, later bids strictly above the highest bid.
    pub fn place_bid(&mut self, bid: Bid) -> Result<(), AuctionError> {
        if !self.is_live {
            return Err(AuctionError::AuctionClosed);
        }

        match self.highest_bid() {
            None if bid.amount <= self.starting_price => Err(AuctionError::BelowStartingPrice),
            Some(highest) if bid.amount <= highest.amount => Err(AuctionError::BelowHighestBid),
            _ => {
                self.bids.push(bid);
                Ok(())
            },
        }
    }

    /// Stop accepting bids and report the result. Closing again reports the
    /// same result.
    pub fn close(&mut self) -> CloseOutcome {
        self.is_live = false;
        self.outcome()
    }

    /// Winner if the highest bid meets the reserve.
    pub fn outcome(&self) -> CloseOutcome {
        match self.highest_bid() {
            Some(bid) if bid.amount >= self.reserve_price => CloseOutcome::Winner {
                auction_id: self.auction_id,
                item_name: self.name.clone(),
                bidder: bid.bidder.clone(),
                amount: bid.amount,
            },
            _ => CloseOutcome::ReserveNotMet {
                auction_id: self.auction_id,
                item_name: self.name.clone(),
            },
        }
    }
}

impl fmt::Display for AuctionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let highest = self.highest_bid().map_or(self.starting_price, |bid| bid.amount);

        writeln!(f, "Auction ID: {}", self.auction_id)?;
        writeln!(f, "Seller: {}", self.owner.username)?;
        writeln!(f, "Item: {}", self.name)?;
        writeln!(f, "Description: {}", self.description)?;
        writeln!(f, "Condition: {}", if self.is_new { "New" } else { "Used" })?;
        writeln!(f, "Highest Bid: £{highest:.2}")?;
        write!(f, "Status: {}", if self.is_live { "LIVE" } else { "CLOSED" })?;

        if !self.is_live {
            match self.outcome() {
                CloseOutcome::Winner { bidder, .. } => write!(f, "\nWinner: {}", bidder.username)?,
                CloseOutcome::ReserveNotMet { .. } => write!(f, "\nWinner: Reserve not met")?,
            }
        }

        Ok(())
    }
}

/// Plaintext authentication challenge.
///
/// # Security
///
/// - **Debug Redaction**: `Debug` prints only the length so outstanding
///   challenges never end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge(String);

impl Challenge {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The plaintext token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Token bytes, as encrypted by the client.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Challenge(<redacted {} chars>)", self.0.len())
    }
}

/// Encrypted echo of a challenge, produced by the client.
///
/// # Security
///
/// - **Debug Redaction**: only the length is printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeProof(pub Vec<u8>);

impl fmt::Debug for ChallengeProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChallengeProof(<redacted {} bytes>)", self.0.len())
    }
}

/// Outstanding challenges keyed by client id.
pub type ChallengeTable = BTreeMap<ClientId, Challenge>;

/// Complete state of one replica, exchanged during resync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaState {
    /// Registered accounts in registration order.
    pub users: Vec<UserAccount>,
    /// Outstanding challenges.
    pub challenges: ChallengeTable,
    /// All listings, live and closed.
    pub listings: BTreeMap<AuctionId, AuctionItem>,
    /// Next id handed to `createAuction`.
    pub next_auction_id: AuctionId,
    /// Next id handed to `register`.
    pub next_client_id: ClientId,
}

impl Default for ReplicaState {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            challenges: ChallengeTable::new(),
            listings: BTreeMap::new(),
            next_auction_id: 1,
            next_client_id: 1,
        }
    }
}

impl ReplicaState {
    /// Look up a registered account by username.
    pub fn user(&self, username: &str) -> Option<&UserAccount> {
        self.users.iter().find(|u| u.username == username)
    }

    /// Whether `account` is exactly a registered account.
    pub fn is_registered(&self, account: &UserAccount) -> bool {
        self.user(&account.username).is_some_and(|u| u == account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller() -> UserAccount {
        UserAccount { client_id: 1, ..UserAccount::new("tom", "tom@hotmail.com", Role::Seller) }
    }

    fn buyer(name: &str) -> UserAccount {
        UserAccount { client_id: 2, ..UserAccount::new(name, format!("{name}@hotmail.com"), Role::Buyer) }
    }

    fn item(start: f64, reserve: f64) -> AuctionItem {
        let mut item = AuctionItem::new(seller(), "lamp", "brass", true, start, reserve);
        item.auction_id = 7;
        item
    }

    #[test]
    fn bids_must_strictly_increase() {
        let mut item = item(100.0, 0.0);
        let max = buyer("max");

        assert_eq!(item.place_bid(Bid::new(max.clone(), 100.0)), Err(AuctionError::BelowStartingPrice));
        assert_eq!(item.place_bid(Bid::new(max.clone(), 150.0)), Ok(()));
        assert_eq!(item.place_bid(Bid::new(max.clone(), 150.0)), Err(AuctionError::BelowHighestBid));
        assert_eq!(item.place_bid(Bid::new(max, 200.0)), Ok(()));

        let amounts: Vec<f64> = item.bids.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![150.0, 200.0]);
    }

    #[test]
    fn closed_item_rejects_bids() {
        let mut item = item(10.0, 0.0);
        item.close();

        assert_eq!(item.place_bid(Bid::new(buyer("max"), 1000.0)), Err(AuctionError::AuctionClosed));
        assert!(item.bids.is_empty());
    }

    #[test]
    fn close_is_stable() {
        let mut item = item(50.0, 80.0);
        item.place_bid(Bid::new(buyer("max"), 90.0)).unwrap();

        let first = item.close();
        let second = item.close();
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "The winner of auction 7 [lamp] is max [max@hotmail.com] for £90.00.");
    }

    #[test]
    fn reserve_is_inclusive() {
        let mut met = item(50.0, 80.0);
        met.place_bid(Bid::new(buyer("max"), 80.0)).unwrap();
        assert!(matches!(met.close(), CloseOutcome::Winner { .. }));

        let mut missed = item(50.0, 80.0);
        missed.place_bid(Bid::new(buyer("max"), 79.0)).unwrap();
        assert_eq!(missed.close().to_string(), "The reserve for auction 7 [lamp] was not met.");
    }

    #[test]
    fn display_shows_winner_once_closed() {
        let mut item = item(50.0, 60.0);
        item.place_bid(Bid::new(buyer("max"), 75.0)).unwrap();
        assert!(item.to_string().ends_with("Status: LIVE"));

        item.close();
        let shown = item.to_string();
        assert!(shown.contains("Highest Bid: £75.00"));
        assert!(shown.ends_with("Status: CLOSED\nWinner: max"));
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::Seller.to_string(), "SELLER");
        assert_eq!(Role::Buyer.to_string(), "BUYER");
    }

    #[test]
    fn challenge_debug_is_redacted() {
        let challenge = Challenge::new("AbCdEf0123");
        let shown = format!("{challenge:?}");
        assert!(!shown.contains("AbCdEf"));
        assert!(shown.contains("10 chars"));
    }

    #[test]
    fn registration_check_compares_whole_account() {
        let mut state = ReplicaState::default();
        state.users.push(seller());

        assert!(state.is_registered(&seller()));
        let forged = UserAccount { client_id: 9, ..seller() };
        assert!(!state.is_registered(&forged));
    }
}
