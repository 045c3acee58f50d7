use crate::{conn::ConnectionInfo, pool::ManagedConnection};
#[cfg(any(feature = "sync", feature = "async"))]
use crate::{conn::HandshakeReply, MdbResult};
#[cfg(feature = "async")]
use async_trait::async_trait;

/// A connection that can probe its server, blocking.
#[cfg(feature = "sync")]
pub trait SyncHeartbeat: ManagedConnection + ConnectionInfo {
    /// Runs the handshake command and returns the server's answer.
    ///
    /// # Errors
    ///
    /// Transport errors, or `MdbError::Command` if the server rejects the probe.
    fn heartbeat_sync(&mut self) -> MdbResult<HandshakeReply>;
}

/// A connection that can probe its server, non-blocking.
#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncHeartbeat: ManagedConnection + ConnectionInfo {
    /// Runs the handshake command and returns the server's answer.
    ///
    /// # Errors
    ///
    /// Transport errors, or `MdbError::Command` if the server rejects the probe.
    async fn heartbeat_async(&mut self) -> MdbResult<HandshakeReply>;
}

/// Something that must be invalidated when the monitor loses the transport to its server,
/// usually the server's [`ConnectionPool`](crate::ConnectionPool).
pub trait Invalidate: Send + Sync {
    /// Marks all current connections as stale.
    fn invalidate(&self);
}

/// Used if nothing is to be invalidated.
#[derive(Debug, Default, Clone, Copy)]
pub struct NothingToInvalidate;
impl Invalidate for NothingToInvalidate {
    fn invalidate(&self) {}
}
