use crate::MdbResult;
#[cfg(feature = "async")]
use async_trait::async_trait;

/// A connection whose lifecycle is managed by a
/// [`ConnectionPool`](crate::ConnectionPool).
///
/// The pool creates connections without opening them; the first caller that acquires
/// a connection pays for opening it.
pub trait ManagedConnection: Send + 'static {
    /// True once the connection was opened successfully.
    fn is_opened(&self) -> bool;

    /// True if the connection was closed, or broke.
    fn is_closed(&self) -> bool;

    /// Closes the connection; must not block, and must be callable repeatedly.
    fn close(&mut self);
}

/// Opening a connection, blocking.
#[cfg(feature = "sync")]
pub trait SyncOpen: ManagedConnection {
    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// Any error that prevents the connection from being usable.
    fn open_sync(&mut self) -> MdbResult<()>;
}

/// Opening a connection, non-blocking.
#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncOpen: ManagedConnection {
    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// Any error that prevents the connection from being usable.
    async fn open_async(&mut self) -> MdbResult<()>;
}

/// Creates the connections of a pool.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The type of the created connections.
    type Connection: ManagedConnection;

    /// Creates a new, unopened connection.
    fn create(&self) -> Self::Connection;
}
