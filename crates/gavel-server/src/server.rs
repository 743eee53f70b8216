//! Client-facing TCP endpoint.
//!
//! Each connection is a session: a stream of length-prefixed CBOR frames, one
//! [`Call`] in and one [`ClientResponse`] out, strictly alternating. The
//! session remembers the account it authenticated as and refuses calls made
//! on behalf of any other account.

use std::{net::SocketAddr, sync::Arc};

use bytes::BytesMut;
use gavel_core::{DirKeyStore, KeyStore, MemoryKeyStore};
use gavel_proto::{Call, ClientResponse, Reply, ServiceError, UserAccount, read_frame, write_frame};
use tokio::net::{TcpListener, TcpStream};

use crate::{
    cluster::Cluster,
    config::ServerConfig,
    coordinator::Coordinator,
    error::ServerError,
    system_env::SystemEnv,
    transport::Transport,
};

/// Per-connection authentication state.
#[derive(Debug, Default)]
pub struct Session {
    user: Option<UserAccount>,
}

impl Session {
    /// Create an unauthenticated session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account this session has logged in as.
    pub fn user(&self) -> Option<&UserAccount> {
        self.user.as_ref()
    }

    /// Check the call against the session, run it and record a successful
    /// login.
    pub async fn dispatch<T: Transport>(
        &mut self,
        coordinator: &Coordinator<T>,
        call: Call,
    ) -> ClientResponse {
        if let Some(acting) = call.acting_account()
            && self.user.as_ref() != Some(acting)
        {
            tracing::debug!(op = call.name(), username = %acting.username, "not authenticated");
            return Err(ServiceError::NotAuthenticated);
        }

        let response = coordinator.handle(call).await;
        if let Ok(Reply::Validated(Ok(account))) = &response {
            tracing::info!(client_id = account.client_id, "session authenticated");
            self.user = Some(account.clone());
        }
        response
    }
}

/// Production Gavel server.
///
/// Owns the replica group and serves its coordinator over TCP.
pub struct Server {
    listener: TcpListener,
    cluster: Cluster<SystemEnv>,
}

impl Server {
    /// Start the replica group and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The key directory cannot be created
    /// - Binding to the address fails
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        if config.cluster.replicas == 0 {
            return Err(ServerError::Config("at least one replica is required".to_string()));
        }

        let keys: Arc<dyn KeyStore> = match &config.key_dir {
            Some(dir) => Arc::new(DirKeyStore::open(dir)?),
            None => Arc::new(MemoryKeyStore::new()),
        };

        let cluster = Cluster::start(config.cluster, SystemEnv::new(), keys).await;
        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self { listener, cluster })
    }

    /// The replica group behind this server.
    pub fn cluster(&self) -> &Cluster<SystemEnv> {
        &self.cluster
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is cancelled.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server listening on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let coordinator = self.cluster.coordinator();
                    tokio::spawn(async move {
                        tracing::debug!("New connection: {}", peer);
                        if let Err(e) = handle_connection(stream, coordinator).await {
                            tracing::error!("Connection error: {}", e);
                        }
                        tracing::debug!("Connection closed: {}", peer);
                    });
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }
}

/// Serve one session until the client disconnects.
async fn handle_connection<T: Transport>(
    stream: TcpStream,
    coordinator: Arc<Coordinator<T>>,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = BytesMut::with_capacity(4096);
    let mut session = Session::new();

    while let Some(call) = read_frame::<_, Call>(&mut reader, &mut buf).await? {
        let response = session.dispatch(coordinator.as_ref(), call).await;
        write_frame(&mut writer, &response).await?;
    }

    if let Some(user) = session.user() {
        tracing::debug!(client_id = user.client_id, "session ended");
    }
    Ok(())
}
