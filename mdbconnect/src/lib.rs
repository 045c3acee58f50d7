//! Synchronous native rust database driver for document databases that speak the legacy
//! wire protocol (`OP_QUERY` / `OP_REPLY` and the legacy write messages).
//!
//! `mdbconnect` keeps one [`Server`] per database endpoint. A server owns
//!
//! - a pool of [`Connection`]s, which are opened lazily, handed out LIFO, and discarded
//!   as a whole generation when a transport error indicates that the server went away,
//! - a monitor thread that sends periodic heartbeats and maintains the
//!   [`ServerDescription`] of the server.
//!
//! Writes are split transparently into as many wire messages as the server's limits require.
//! With an acknowledged [`WriteConcern`] and a server that supports it, writes are sent
//! as write commands; otherwise the legacy write messages are used, each followed by a
//! `getlasterror` where a confirmation is needed.
//!
//! If you need an asynchronous driver, use `mdbconnect_async`.
//!
//! # Example
//!
//! ```rust,no_run
//! use mdbconnect::{
//!     ClusterId, ConnectParams, ConnectionConfiguration, Credential, Namespace, Server,
//!     ServerAddress, ServerId, ServerSettings, WriteConcern,
//! };
//! # fn main() -> mdbconnect::MdbResult<()> {
//! let address = ServerAddress::parse("localhost:27017")?;
//! let params = ConnectParams::new(address.clone())
//!     .with_credential(Credential::new("my_user", "my_passwd").with_source("admin"));
//! let server = Server::start(
//!     ServerId::new(ClusterId::new(), address),
//!     params,
//!     ConnectionConfiguration::default(),
//!     ServerSettings::default(),
//! )?;
//!
//! let mut connection = server.get_connection()?;
//! let result = connection.insert(
//!     &Namespace::new("test", "people")?,
//!     vec![bson::doc! {"name": "Ada"}, bson::doc! {"name": "Grace"}],
//!     true,
//!     WriteConcern::ACKNOWLEDGED,
//! )?;
//! assert_eq!(result.count(), 2);
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
///
/// # Example
///
/// ```rust
/// # use mdbconnect::ConnectionConfiguration;
/// # use std::time::Duration;
/// let config = ConnectionConfiguration::default()
///     .with_connect_timeout(Duration::from_secs(3))
///     .with_read_timeout(Some(Duration::from_secs(30)));
/// ```
pub use mdbconnect_impl::ConnectionConfiguration;

pub use mdbconnect_impl::{
    Acknowledgment, AuthMechanism, ClusterId, ConnectParams, ConnectionDescription,
    ConnectionId, ConnectionPoolListener, ConnectionPoolSettings, ConnectionState, Credential,
    MdbError, MdbResult, MessageSettings, MonitorListeners, Namespace, PoolStatistics,
    QueryFlags, QueryOptions, RemovalReason, Reply, ServerAddress, ServerDescription,
    ServerDescriptionChangedEvent, ServerId, ServerListener, ServerMonitorListener,
    ServerMonitorSettings, ServerSettings, ServerState, ServerType, ServerVersion,
    StaleReason, StreamFactory, SyncStream, TcpStreamFactory, Upsert, WriteConcern,
    WriteConcernError, WriteError, WriteKind, WriteRequest, WriteResult, DEFAULT_PORT,
};

pub use mdbconnect_impl::sync::{Connection, Server};

/// The building blocks below [`Server`], for callers that want to assemble their own
/// topology handling.
pub mod building_blocks {
    pub use mdbconnect_impl::{
        authenticator_for, run_command_sync, Authenticator, ConnectionCore,
        ConnectionCoreFactory, ConnectionFactory, ConnectionInfo, ConnectionPool,
        HandshakeReply, Invalidate, ManagedConnection, NothingToInvalidate, PooledConnection,
        RoundTripTimeAverage, ServerMonitor, SyncHeartbeat, SyncOpen, WireConnection,
    };
}
