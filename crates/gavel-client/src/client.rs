//! Client session.
//!
//! One `AuctionClient` is one server connection. It sends a call, waits for
//! the reply, and remembers the account it logged in as so that listing,
//! bidding and closing act on behalf of that account.

use bytes::BytesMut;
use gavel_core::{Environment, KeyStore};
use gavel_crypto::{SharedSecret, seal_challenge};
use gavel_proto::{
    AuctionId, AuctionItem, Bid, Call, ChallengeProof, ClientId, ClientResponse, CloseOutcome,
    Outcome, Reply, Role, UserAccount, read_frame, write_frame,
};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::ClientError;

/// A new listing, before the owner is filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// Item name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// New (true) or used (false).
    pub is_new: bool,
    /// The first bid must exceed this.
    pub starting_price: f64,
    /// Minimum winning amount.
    pub reserve_price: f64,
}

/// Connection to a Gavel server.
pub struct AuctionClient<E: Environment> {
    stream: TcpStream,
    buf: BytesMut,
    env: E,
    account: Option<UserAccount>,
}

impl<E: Environment> AuctionClient<E> {
    /// Connect to a server.
    pub async fn connect(addr: impl ToSocketAddrs, env: E) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(ClientError::Connect)?;
        Ok(Self { stream, buf: BytesMut::with_capacity(4096), env, account: None })
    }

    /// Account this session is logged in as.
    pub fn account(&self) -> Option<&UserAccount> {
        self.account.as_ref()
    }

    /// Send one call and wait for its reply.
    pub async fn call(&mut self, call: Call) -> Result<Reply, ClientError> {
        let op = call.name();
        write_frame(&mut self.stream, &call).await?;

        let response: ClientResponse =
            read_frame(&mut self.stream, &mut self.buf).await?.ok_or(ClientError::Disconnected)?;
        tracing::debug!(op, ok = response.is_ok(), "reply received");
        Ok(response?)
    }

    /// Register a new account.
    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        role: Role,
    ) -> Result<Outcome<ClientId>, ClientError> {
        match self.call(Call::Register(UserAccount::new(username, email, role))).await? {
            Reply::Registered(outcome) => Ok(outcome),
            _ => Err(ClientError::UnexpectedReply { op: "register" }),
        }
    }

    /// Log in with the account's shared secret.
    ///
    /// Asks for a challenge, seals it under `secret` and sends it back. On
    /// success the session acts as the returned account from then on.
    pub async fn login(
        &mut self,
        username: &str,
        secret: &SharedSecret,
    ) -> Result<Outcome<UserAccount>, ClientError> {
        let challenge = match self.call(Call::GetChallenge { username: username.to_string() }).await? {
            Reply::Challenge(Ok(challenge)) => challenge,
            Reply::Challenge(Err(e)) => return Ok(Err(e)),
            _ => return Err(ClientError::UnexpectedReply { op: "getChallenge" }),
        };

        let nonce = self.env.random_array()?;
        let proof = seal_challenge(secret, username, challenge.as_bytes(), nonce)?;
        let call = Call::ValidateChallenge { proof: ChallengeProof(proof), username: username.to_string() };

        let outcome = match self.call(call).await? {
            Reply::Validated(outcome) => outcome,
            _ => return Err(ClientError::UnexpectedReply { op: "validateChallenge" }),
        };
        if let Ok(account) = &outcome {
            tracing::info!(client_id = account.client_id, "logged in");
            self.account = Some(account.clone());
        }
        Ok(outcome)
    }

    /// Log in with the secret provisioned for `username` in `keys`.
    pub async fn login_with(
        &mut self,
        username: &str,
        keys: &dyn KeyStore,
    ) -> Result<Outcome<UserAccount>, ClientError> {
        let secret = keys
            .lookup(username)?
            .ok_or_else(|| ClientError::MissingKey { username: username.to_string() })?;
        self.login(username, &secret).await
    }

    /// Every auction, live and closed.
    pub async fn browse(&mut self) -> Result<Vec<AuctionItem>, ClientError> {
        match self.call(Call::BrowseAuctions).await? {
            Reply::Listings(items) => Ok(items),
            _ => Err(ClientError::UnexpectedReply { op: "browseAuctions" }),
        }
    }

    /// List an item as the logged-in seller.
    pub async fn create_auction(&mut self, listing: Listing) -> Result<Outcome<AuctionId>, ClientError> {
        let owner = self.account.clone().ok_or(ClientError::NotLoggedIn)?;
        let item = AuctionItem::new(
            owner,
            listing.name,
            listing.description,
            listing.is_new,
            listing.starting_price,
            listing.reserve_price,
        );

        match self.call(Call::CreateAuction(item)).await? {
            Reply::Created(outcome) => Ok(outcome),
            _ => Err(ClientError::UnexpectedReply { op: "createAuction" }),
        }
    }

    /// Bid as the logged-in buyer.
    pub async fn bid(&mut self, auction_id: AuctionId, amount: f64) -> Result<Outcome<()>, ClientError> {
        let bidder = self.account.clone().ok_or(ClientError::NotLoggedIn)?;

        match self.call(Call::BidOnItem { auction_id, bid: Bid::new(bidder, amount) }).await? {
            Reply::BidPlaced(outcome) => Ok(outcome),
            _ => Err(ClientError::UnexpectedReply { op: "bidOnItem" }),
        }
    }

    /// Close one of the logged-in seller's auctions.
    pub async fn close(&mut self, auction_id: AuctionId) -> Result<Outcome<CloseOutcome>, ClientError> {
        let requester = self.account.clone().ok_or(ClientError::NotLoggedIn)?;

        match self.call(Call::CloseAuction { auction_id, requester }).await? {
            Reply::Closed(outcome) => Ok(outcome),
            _ => Err(ClientError::UnexpectedReply { op: "closeAuction" }),
        }
    }
}
