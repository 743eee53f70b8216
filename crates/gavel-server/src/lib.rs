//! Gavel replicated auction server.
//!
//! This crate provides the replica group and its client-facing front end:
//! - Tokio for the async runtime
//! - An in-process broadcast transport with a membership view
//! - A coordinator that votes on replica replies and resyncs dissenters
//!
//! ## Architecture
//!
//! ```text
//! gavel-server
//!   ├─ Server          (TCP listener, one Session per connection)
//!   ├─ Coordinator     (broadcast, majority vote, resync, challenge adoption)
//!   ├─ Cluster         (replica bootstrap: seed, join, resync)
//!   ├─ ReplicaNode     (mutex-guarded AuctionState + resync protocol)
//!   ├─ LocalGroup      (membership view + fault injection)
//!   └─ SystemEnv       (production Environment impl)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cluster;
mod config;
mod coordinator;
mod error;
mod local;
mod replica_node;
mod server;
mod system_env;
mod transport;

pub use cluster::{Cluster, LocalReplica};
pub use config::{ClusterConfig, ServerConfig, default_seed_users};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError, DEFAULT_BROADCAST_TIMEOUT};
pub use error::ServerError;
pub use local::{LocalGroup, LocalTransport, MemberFault};
pub use replica_node::{ReplicaNode, ResyncOutcome};
pub use server::{Server, Session};
pub use system_env::SystemEnv;
pub use transport::{MemberId, ReplicaHandler, Responses, Transport, TransportError};
