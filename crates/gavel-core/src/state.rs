//! Per-replica auction state machine.
//!
//! `AuctionState` owns one replica's users, challenges, listings and id
//! counters. Every operation is a function of the current state plus the
//! request; rejections are returned as [`AuctionError`] values, never raised,
//! so that every replica produces a comparable reply.
//!
//! # Concurrency
//!
//! All operations take `&mut self`. The owner (the replica node) holds the
//! state behind a single mutex, which makes each request an atomic critical
//! section: ids cannot be double-assigned and two bids cannot both pass the
//! "strictly greater than highest" check.

use std::sync::Arc;

use gavel_crypto::{SharedSecret, open_challenge};
use gavel_proto::{
    AuctionError, AuctionId, AuctionItem, Bid, Call, Challenge, ChallengeProof, ClientId,
    CloseOutcome, Outcome, Reply, ReplicaState, Role, UserAccount,
};
use tracing::{debug, error, info};

use crate::{
    env::Environment,
    keystore::{KeyStore, is_valid_username},
};

/// Length of an issued challenge token.
pub const CHALLENGE_LEN: usize = 16;

/// One replica's auction state.
pub struct AuctionState<E: Environment> {
    env: E,
    keys: Arc<dyn KeyStore>,
    state: ReplicaState,
}

impl<E: Environment> AuctionState<E> {
    /// Create an empty state machine.
    pub fn new(env: E, keys: Arc<dyn KeyStore>) -> Self {
        Self { env, keys, state: ReplicaState::default() }
    }

    /// Register `user`, provision its shared secret and return the assigned
    /// client id.
    ///
    /// Any `client_id` on the incoming account is ignored.
    pub fn register(&mut self, user: UserAccount) -> Outcome<ClientId> {
        if !is_valid_username(&user.username) {
            return Err(AuctionError::InvalidAccount {
                reason: "username must be 1 to 32 letters, digits, '_' or '-'".to_string(),
            });
        }
        if !user.email.contains('@') {
            return Err(AuctionError::InvalidAccount {
                reason: "email address must contain '@'".to_string(),
            });
        }

        let taken = self
            .state
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            debug!(username = %user.username, "registration conflict");
            return Err(AuctionError::Conflict);
        }

        let seed = match self.env.random_array() {
            Ok(seed) => seed,
            Err(e) => {
                error!(username = %user.username, error = %e, "no entropy for secret");
                return Err(AuctionError::KeyProvisioning);
            },
        };
        let secret = SharedSecret::from_random(seed);
        if let Err(e) = self.keys.provision(&user.username, &secret) {
            error!(username = %user.username, error = %e, "failed to provision secret");
            return Err(AuctionError::KeyProvisioning);
        }

        let client_id = self.state.next_client_id;
        self.state.next_client_id += 1;
        self.state.users.push(UserAccount { client_id, ..user });

        info!(client_id, role = %user.role, "account registered");
        Ok(client_id)
    }

    /// Issue a fresh challenge for `username`, replacing any outstanding one.
    pub fn issue_challenge(&mut self, username: &str) -> Outcome<Challenge> {
        let client_id = self.state.user(username).ok_or(AuctionError::UnknownUser)?.client_id;

        let token = self.env.random_token(CHALLENGE_LEN).map_err(|e| {
            error!(client_id, error = %e, "no entropy for challenge");
            AuctionError::ChallengeUnavailable
        })?;
        let challenge = Challenge::new(token);
        self.state.challenges.insert(client_id, challenge.clone());

        debug!(client_id, "challenge issued");
        Ok(challenge)
    }

    /// Store `challenge` as the outstanding challenge for `username`.
    ///
    /// Used to install a challenge issued by another replica so that every
    /// replica can validate the proof. Only that user's entry changes.
    pub fn adopt_challenge(&mut self, username: &str, challenge: Challenge) -> Outcome<()> {
        let client_id = self.state.user(username).ok_or(AuctionError::UnknownUser)?.client_id;
        self.state.challenges.insert(client_id, challenge);

        debug!(client_id, "challenge adopted");
        Ok(())
    }

    /// Check a proof against the outstanding challenge for `username`.
    ///
    /// Every failure is reported as [`AuctionError::Unauthorized`]. On success
    /// the registered account is returned and the challenge is removed, so the
    /// same proof cannot log in twice. Unused challenges stay until the next
    /// issue for that user overwrites them.
    pub fn validate_challenge(
        &mut self,
        proof: &ChallengeProof,
        username: &str,
    ) -> Outcome<UserAccount> {
        let account = match self.check_proof(proof, username) {
            Ok(account) => account,
            Err(reason) => {
                debug!(username, reason, "challenge validation failed");
                return Err(AuctionError::Unauthorized);
            },
        };

        self.state.challenges.remove(&account.client_id);
        info!(client_id = account.client_id, "challenge validated");
        Ok(account)
    }

    fn check_proof(
        &self,
        proof: &ChallengeProof,
        username: &str,
    ) -> Result<UserAccount, &'static str> {
        let account = self.state.user(username).ok_or("unknown user")?;
        let challenge =
            self.state.challenges.get(&account.client_id).ok_or("no outstanding challenge")?;
        let secret = self
            .keys
            .lookup(username)
            .map_err(|_| "key store error")?
            .ok_or("no provisioned secret")?;
        let opened = open_challenge(&secret, username, &proof.0).map_err(|_| "decryption failed")?;

        if opened != challenge.as_bytes() {
            return Err("challenge mismatch");
        }
        Ok(account.clone())
    }

    /// List `item` and return its new auction id.
    ///
    /// The id, bid history and live flag on the incoming item are replaced.
    pub fn create_auction(&mut self, item: AuctionItem) -> Outcome<AuctionId> {
        if item.owner.role != Role::Seller {
            return Err(AuctionError::NotSeller);
        }
        if !self.state.is_registered(&item.owner) {
            return Err(AuctionError::UnknownUser);
        }
        validate_listing(&item)?;

        let auction_id = self.state.next_auction_id;
        self.state.next_auction_id += 1;
        self.state
            .listings
            .insert(auction_id, AuctionItem { auction_id, bids: Vec::new(), is_live: true, ..item });

        info!(auction_id, "auction created");
        Ok(auction_id)
    }

    /// Close a listing on behalf of `requester` and report the result.
    ///
    /// Closing an already closed listing reports the same result again.
    pub fn close_auction(
        &mut self,
        auction_id: AuctionId,
        requester: &UserAccount,
    ) -> Outcome<CloseOutcome> {
        let item = self
            .state
            .listings
            .get_mut(&auction_id)
            .ok_or(AuctionError::AuctionNotFound(auction_id))?;
        if item.owner != *requester {
            return Err(AuctionError::NotOwner);
        }

        let outcome = item.close();
        info!(auction_id, "auction closed");
        Ok(outcome)
    }

    /// Place `bid` on a listing.
    pub fn bid_on_item(&mut self, auction_id: AuctionId, bid: Bid) -> Outcome<()> {
        if bid.bidder.role != Role::Buyer {
            return Err(AuctionError::NotBuyer);
        }
        if !self.state.listings.contains_key(&auction_id) {
            return Err(AuctionError::AuctionNotFound(auction_id));
        }
        if !self.state.is_registered(&bid.bidder) {
            return Err(AuctionError::UnknownUser);
        }
        if !bid.amount.is_finite() || bid.amount <= 0.0 {
            return Err(AuctionError::InvalidAmount);
        }

        let item = self
            .state
            .listings
            .get_mut(&auction_id)
            .ok_or(AuctionError::AuctionNotFound(auction_id))?;
        item.place_bid(bid).inspect_err(|e| debug!(auction_id, %e, "bid rejected"))?;

        debug!(auction_id, "bid accepted");
        Ok(())
    }

    /// Every listing, live and closed, in auction id order.
    pub fn browse(&self) -> Vec<AuctionItem> {
        self.state.listings.values().cloned().collect()
    }

    /// Dispatch a client call.
    pub fn apply(&mut self, call: Call) -> Reply {
        match call {
            Call::Register(user) => Reply::Registered(self.register(user)),
            Call::GetChallenge { username } => Reply::Challenge(self.issue_challenge(&username)),
            Call::ValidateChallenge { proof, username } => {
                Reply::Validated(self.validate_challenge(&proof, &username))
            },
            Call::CreateAuction(item) => Reply::Created(self.create_auction(item)),
            Call::CloseAuction { auction_id, requester } => {
                Reply::Closed(self.close_auction(auction_id, &requester))
            },
            Call::BidOnItem { auction_id, bid } => Reply::BidPlaced(self.bid_on_item(auction_id, bid)),
            Call::BrowseAuctions => Reply::Listings(self.browse()),
        }
    }

    /// Copy of the complete state.
    pub fn snapshot(&self) -> ReplicaState {
        self.state.clone()
    }

    /// Replace the complete state.
    pub fn restore(&mut self, state: ReplicaState) {
        self.state = state;
    }

    /// Read-only view of the state.
    pub fn state(&self) -> &ReplicaState {
        &self.state
    }
}

fn validate_listing(item: &AuctionItem) -> Result<(), AuctionError> {
    let reason = if item.name.trim().is_empty() {
        "item name must not be empty"
    } else if !item.starting_price.is_finite() || item.starting_price < 0.0 {
        "starting price must be a non-negative number"
    } else if !item.reserve_price.is_finite() || item.reserve_price < 0.0 {
        "reserve price must be a non-negative number"
    } else {
        return Ok(());
    };

    Err(AuctionError::InvalidListing { reason: reason.to_string() })
}
