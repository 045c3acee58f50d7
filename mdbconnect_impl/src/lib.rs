//! Do not use this crate directly.
//!
//! This is the implementation crate for `mdbconnect` and `mdbconnect_async`.
//!
//! If you need a synchronous driver, use `mdbconnect`.
//!
//! If you need an asynchronous driver, use `mdbconnect_async`.
//!

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::non_ascii_literal)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![cfg_attr(not(any(feature = "sync", feature = "async")), allow(unused_imports))]
#![cfg_attr(not(any(feature = "sync", feature = "async")), allow(dead_code))]

#[macro_use]
extern crate log;

#[macro_use]
mod mdb_error;

mod conn;
mod monitor;
mod pool;
mod protocol;
mod server_settings;
mod write;

#[cfg(feature = "async")]
pub mod a_sync;
#[cfg(feature = "sync")]
pub mod sync;

pub use crate::conn::{
    authenticator_for, AuthMechanism, Authenticator, ClusterId, ConnectParams,
    ConnectionConfiguration, ConnectionCore, ConnectionCoreFactory, ConnectionDescription,
    ConnectionId, ConnectionInfo, ConnectionStatistics, Credential, HandshakeReply,
    ServerAddress, ServerId, ServerType, ServerVersion, StreamFactory, TcpStreamFactory,
    DEFAULT_PORT,
};
#[cfg(feature = "async")]
pub use crate::conn::{run_command_async, AsyncStream, AsyncWireConnection};
#[cfg(feature = "sync")]
pub use crate::conn::{run_command_sync, SyncStream, WireConnection};

pub use crate::mdb_error::{MdbError, MdbResult};

pub use crate::monitor::{
    Invalidate, MonitorListeners, NothingToInvalidate, RoundTripTimeAverage, ServerDescription,
    ServerDescriptionChangedEvent, ServerListener, ServerMonitorListener, ServerMonitorSettings,
    ServerState,
};
#[cfg(feature = "async")]
pub use crate::monitor::{AsyncHeartbeat, AsyncServerMonitor};
#[cfg(feature = "sync")]
pub use crate::monitor::{ServerMonitor, SyncHeartbeat};

pub use crate::pool::{
    ConnectionFactory, ConnectionPool, ConnectionPoolListener, ConnectionPoolSettings,
    ConnectionState, ManagedConnection, PoolStatistics, PooledConnection, RemovalReason,
    StaleReason,
};
#[cfg(feature = "async")]
pub use crate::pool::AsyncOpen;
#[cfg(feature = "sync")]
pub use crate::pool::SyncOpen;

pub use crate::protocol::{
    MessageSettings, Namespace, OpCode, QueryFlags, QueryOptions, Reply, ReplyHeader,
};
pub use crate::server_settings::ServerSettings;
pub use crate::write::{
    Acknowledgment, Upsert, WriteConcern, WriteConcernError, WriteError, WriteKind, WriteRequest,
    WriteResult,
};
