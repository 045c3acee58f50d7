//! Asynchronous native rust database driver for document databases that speak the legacy
//! wire protocol (`OP_QUERY` / `OP_REPLY` and the legacy write messages).
//!
//! `mdbconnect_async` runs on [tokio](https://crates.io/crates/tokio). It keeps one
//! [`Server`] per database endpoint; a server owns a pool of lazily opened [`Connection`]s
//! and a monitor task that sends periodic heartbeats and maintains the
//! [`ServerDescription`] of the server.
//!
//! Waiting for a pooled connection is cancellation safe: if the future that waits for a
//! connection is dropped after it was woken, the wakeup is passed on to the next waiter.
//!
//! If you need a synchronous driver, use `mdbconnect`.
//!
//! # Example
//!
//! ```rust,no_run
//! use mdbconnect_async::{
//!     ClusterId, ConnectParams, ConnectionConfiguration, Namespace, QueryOptions, Server,
//!     ServerAddress, ServerId, ServerSettings,
//! };
//! # async fn foo() -> mdbconnect_async::MdbResult<()> {
//! let address = ServerAddress::new("localhost", 27017);
//! let server = Server::start(
//!     ServerId::new(ClusterId::new(), address.clone()),
//!     ConnectParams::new(address),
//!     ConnectionConfiguration::default(),
//!     ServerSettings::default(),
//! )?;
//!
//! let mut connection = server.get_connection().await?;
//! let reply = connection
//!     .query(
//!         &Namespace::new("test", "people")?,
//!         bson::doc! {"name": "Ada"},
//!         QueryOptions::default().with_number_to_return(10),
//!     )
//!     .await?;
//! for document in reply.documents() {
//!     println!("{document}");
//! }
//! # Ok(())
//! # }
//! ```

// only enables the `doc_cfg` feature when the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

/// Provides some statistics about the use of a concrete connection.
///
/// A snapshot of the statistics can be obtained from [`Connection::statistics`].
/// It is possible to reset the statistics using [`Connection::reset_statistics`].
pub use mdbconnect_impl::ConnectionStatistics;

/// A collection of settings that influence the runtime behavior of a physical connection.
pub use mdbconnect_impl::ConnectionConfiguration;

pub use mdbconnect_impl::{
    Acknowledgment, AsyncStream, AuthMechanism, ClusterId, ConnectParams,
    ConnectionDescription, ConnectionId, ConnectionPoolListener, ConnectionPoolSettings,
    ConnectionState, Credential, MdbError, MdbResult, MessageSettings, MonitorListeners,
    Namespace, PoolStatistics, QueryFlags, QueryOptions, RemovalReason, Reply, ServerAddress,
    ServerDescription, ServerDescriptionChangedEvent, ServerId, ServerListener,
    ServerMonitorListener, ServerMonitorSettings, ServerSettings, ServerState, ServerType,
    ServerVersion, StaleReason, StreamFactory, TcpStreamFactory, Upsert, WriteConcern,
    WriteConcernError, WriteError, WriteKind, WriteRequest, WriteResult, DEFAULT_PORT,
};

pub use mdbconnect_impl::a_sync::{Connection, Server};

/// The building blocks below [`Server`], for callers that want to assemble their own
/// topology handling.
pub mod building_blocks {
    pub use mdbconnect_impl::{
        authenticator_for, run_command_async, AsyncHeartbeat, AsyncOpen, AsyncServerMonitor,
        AsyncWireConnection, Authenticator, ConnectionCore, ConnectionCoreFactory,
        ConnectionFactory, ConnectionInfo, ConnectionPool, HandshakeReply, Invalidate,
        ManagedConnection, NothingToInvalidate, PooledConnection, RoundTripTimeAverage,
    };
}
