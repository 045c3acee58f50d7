use super::{ConnectionPoolSettings, StaleReason};

/// Why the pool destroyed a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalReason {
    /// The connection was found stale at a check.
    Stale(StaleReason),
    /// Opening the connection failed.
    OpenFailed,
    /// The pool was closed.
    PoolClosed,
}

/// Observer of a connection pool's lifecycle.
///
/// The pool calls these hooks synchronously and never while it holds its lock;
/// implementations must be cheap. All methods do nothing by default.
#[allow(unused_variables)]
pub trait ConnectionPoolListener: Send + Sync {
    /// The pool was created.
    fn connection_pool_opened(&self, settings: &ConnectionPoolSettings) {}
    /// The pool was closed.
    fn connection_pool_closed(&self) {}
    /// A connection was created and opened.
    fn connection_added(&self, generation: u64) {}
    /// A connection was destroyed.
    fn connection_removed(&self, reason: RemovalReason) {}
    /// A connection was handed out.
    fn connection_checked_out(&self, generation: u64) {}
    /// A connection came back into the pool.
    fn connection_checked_in(&self, generation: u64) {}
    /// A caller started to wait for a connection.
    fn wait_queue_entered(&self) {}
    /// A caller stopped waiting, with or without a connection.
    fn wait_queue_exited(&self) {}
}

// The listener of pools without one.
pub(crate) struct NoListener;
impl ConnectionPoolListener for NoListener {}
