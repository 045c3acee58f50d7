//! A generation-versioned connection pool.
//!
//! The pool is generic over the connections it manages, see [`ConnectionFactory`] and
//! [`ManagedConnection`]; the driver uses it with
//! [`ConnectionCore`](crate::ConnectionCore).

mod connection_pool;
mod connection_pool_settings;
mod managed_connection;
mod pool_listener;
mod pooled_connection;
mod tracked_connection;

pub use self::{
    connection_pool::{ConnectionPool, PoolStatistics},
    connection_pool_settings::ConnectionPoolSettings,
    managed_connection::{ConnectionFactory, ManagedConnection},
    pool_listener::{ConnectionPoolListener, RemovalReason},
    pooled_connection::PooledConnection,
    tracked_connection::{ConnectionState, StaleReason},
};
pub(crate) use self::tracked_connection::TrackedConnection;

#[cfg(feature = "async")]
pub use self::managed_connection::AsyncOpen;
#[cfg(feature = "sync")]
pub use self::managed_connection::SyncOpen;
