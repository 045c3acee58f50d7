use super::{connection_pool::PoolInner, ConnectionFactory, TrackedConnection};
#[cfg(feature = "async")]
use crate::conn::AsyncWireConnection;
#[cfg(feature = "sync")]
use crate::conn::WireConnection;
use crate::{
    conn::{ConnectionDescription, ConnectionInfo},
    protocol::Reply,
    MdbResult,
};
#[cfg(feature = "async")]
use async_trait::async_trait;
use std::sync::Arc;

/// A connection that was handed out by a [`ConnectionPool`](crate::ConnectionPool).
///
/// Dropping it, or calling [`PooledConnection::release`], gives it back to the pool.
/// A transport error on the connection invalidates the pool, because the other
/// connections to the same server are then suspect as well.
pub struct PooledConnection<F: ConnectionFactory> {
    tracked: Option<TrackedConnection<F::Connection>>,
    pool: Arc<PoolInner<F>>,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    pub(crate) fn new(tracked: TrackedConnection<F::Connection>, pool: Arc<PoolInner<F>>) -> Self {
        Self {
            tracked: Some(tracked),
            pool,
        }
    }

    /// The pooled connection itself.
    pub fn connection(&self) -> Option<&F::Connection> {
        self.tracked.as_ref().map(|t| &t.connection)
    }

    /// The pooled connection itself, mutable.
    pub fn connection_mut(&mut self) -> Option<&mut F::Connection> {
        self.tracked.as_mut().map(|t| &mut t.connection)
    }

    /// The pool generation the connection was created in.
    pub fn generation(&self) -> Option<u64> {
        self.tracked.as_ref().map(TrackedConnection::generation)
    }

    /// Gives the connection back to its pool.
    pub fn release(mut self) {
        self.check_in();
    }

    fn check_in(&mut self) {
        if let Some(tracked) = self.tracked.take() {
            self.pool.check_in(tracked);
        }
    }

    fn tracked_mut(&mut self) -> MdbResult<&mut TrackedConnection<F::Connection>> {
        self.tracked
            .as_mut()
            .ok_or_else(|| impl_err!("pooled connection was already released"))
    }

    fn after_io<T>(&mut self, result: MdbResult<T>) -> MdbResult<T> {
        match result {
            Ok(value) => {
                if let Some(tracked) = self.tracked.as_mut() {
                    tracked.touch();
                }
                Ok(value)
            }
            Err(e) => {
                if e.is_transport() {
                    warn!("transport error on a pooled connection, invalidating the pool: {e}");
                    self.pool.invalidate();
                }
                Err(e)
            }
        }
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        self.check_in();
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for PooledConnection<F>
where
    F::Connection: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("tracked", &self.tracked)
            .finish_non_exhaustive()
    }
}

impl<F> ConnectionInfo for PooledConnection<F>
where
    F: ConnectionFactory,
    F::Connection: ConnectionInfo,
{
    fn description(&self) -> Option<&ConnectionDescription> {
        self.tracked.as_ref().and_then(|t| t.connection.description())
    }
}

#[cfg(feature = "sync")]
impl<F> WireConnection for PooledConnection<F>
where
    F: ConnectionFactory,
    F::Connection: WireConnection,
{
    fn send_message_sync(&mut self, message: &[u8], last_request_id: i32) -> MdbResult<()> {
        let result = self
            .tracked_mut()?
            .connection
            .send_message_sync(message, last_request_id);
        self.after_io(result)
    }

    fn receive_message_sync(&mut self, response_to: i32) -> MdbResult<Reply> {
        let result = self.tracked_mut()?.connection.receive_message_sync(response_to);
        self.after_io(result)
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<F> AsyncWireConnection for PooledConnection<F>
where
    F: ConnectionFactory,
    F::Connection: AsyncWireConnection,
{
    async fn send_message_async(&mut self, message: &[u8], last_request_id: i32) -> MdbResult<()> {
        let result = self
            .tracked_mut()?
            .connection
            .send_message_async(message, last_request_id)
            .await;
        self.after_io(result)
    }

    async fn receive_message_async(&mut self, response_to: i32) -> MdbResult<Reply> {
        let result = self
            .tracked_mut()?
            .connection
            .receive_message_async(response_to)
            .await;
        self.after_io(result)
    }
}
