//! Client session against an in-process server.

use std::{net::SocketAddr, time::Duration};

use gavel_client::{AuctionClient, ClientError, Listing};
use gavel_core::DirKeyStore;
use gavel_crypto::SharedSecret;
use gavel_proto::{AuctionError, Role};
use gavel_server::{ClusterConfig, Server, ServerConfig, SystemEnv};
use tempfile::TempDir;

async fn start() -> (SocketAddr, TempDir, DirKeyStore) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        cluster: ClusterConfig { broadcast_timeout: Duration::from_millis(500), ..Default::default() },
        key_dir: Some(dir.path().to_path_buf()),
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let keys = DirKeyStore::open(dir.path()).unwrap();
    (addr, dir, keys)
}

fn lamp() -> Listing {
    Listing {
        name: "Lamp".into(),
        description: "Brass desk lamp".into(),
        is_new: true,
        starting_price: 10.0,
        reserve_price: 15.0,
    }
}

#[tokio::test]
async fn register_then_login() {
    let (addr, _dir, keys) = start().await;
    let mut client = AuctionClient::connect(addr, SystemEnv::new()).await.unwrap();

    let id = client.register("alice", "alice@example.com", Role::Seller).await.unwrap().unwrap();
    let account = client.login_with("alice", &keys).await.unwrap().unwrap();

    assert_eq!(account.client_id, id);
    assert_eq!(client.account(), Some(&account));
}

#[tokio::test]
async fn login_with_wrong_secret_is_unauthorized() {
    let (addr, _dir, _keys) = start().await;
    let mut client = AuctionClient::connect(addr, SystemEnv::new()).await.unwrap();

    let forged = SharedSecret::from_random([7; 32]);
    assert_eq!(client.login("tom", &forged).await.unwrap(), Err(AuctionError::Unauthorized));
    assert!(client.account().is_none());
}

#[tokio::test]
async fn login_unknown_user() {
    let (addr, _dir, keys) = start().await;
    let mut client = AuctionClient::connect(addr, SystemEnv::new()).await.unwrap();

    assert!(matches!(
        client.login_with("nobody", &keys).await,
        Err(ClientError::MissingKey { .. })
    ));
    assert_eq!(
        client.login("nobody", &SharedSecret::from_random([0; 32])).await.unwrap(),
        Err(AuctionError::UnknownUser)
    );
}

#[tokio::test]
async fn actions_need_login() {
    let (addr, _dir, _keys) = start().await;
    let mut client = AuctionClient::connect(addr, SystemEnv::new()).await.unwrap();

    assert!(matches!(client.create_auction(lamp()).await, Err(ClientError::NotLoggedIn)));
    assert!(matches!(client.bid(1, 20.0).await, Err(ClientError::NotLoggedIn)));
    assert!(matches!(client.close(1).await, Err(ClientError::NotLoggedIn)));
}

#[tokio::test]
async fn roles_are_enforced() {
    let (addr, _dir, keys) = start().await;
    let mut seller = AuctionClient::connect(addr, SystemEnv::new()).await.unwrap();
    let mut buyer = AuctionClient::connect(addr, SystemEnv::new()).await.unwrap();
    seller.login_with("fred", &keys).await.unwrap().unwrap();
    buyer.login_with("shaun", &keys).await.unwrap().unwrap();

    assert_eq!(buyer.create_auction(lamp()).await.unwrap(), Err(AuctionError::NotSeller));

    let id = seller.create_auction(lamp()).await.unwrap().unwrap();
    assert_eq!(seller.bid(id, 1_000.0).await.unwrap(), Err(AuctionError::NotBuyer));
    assert_eq!(buyer.close(id).await.unwrap(), Err(AuctionError::NotOwner));
}

#[tokio::test]
async fn connect_failure_is_fatal() {
    // Bind and drop to get a port nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let Err(err) = AuctionClient::connect(addr, SystemEnv::new()).await else {
        panic!("connected to a closed port");
    };
    assert!(err.is_fatal());
}
