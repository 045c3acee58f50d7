#[cfg(feature = "async")]
mod async_tcp_client;
#[cfg(feature = "sync")]
mod sync_tcp_client;

#[cfg(feature = "async")]
pub(crate) use async_tcp_client::AsyncTcpClient;
#[cfg(feature = "sync")]
pub(crate) use sync_tcp_client::SyncTcpClient;

#[cfg(any(feature = "sync", feature = "async"))]
use crate::{
    conn::{ConnectParams, ConnectionConfiguration},
    MdbResult,
};
#[cfg(any(feature = "sync", feature = "async"))]
use std::time::Instant;

// A buffered byte stream to the server, synchronous or asynchronous.
#[derive(Debug)]
pub(crate) enum TcpClient {
    // A buffered blocking stream.
    #[cfg(feature = "sync")]
    Sync(SyncTcpClient),

    // A buffered async stream.
    #[cfg(feature = "async")]
    Async(AsyncTcpClient),

    // Communication issues made the stream unusable, or it was closed.
    Dead { reason: String },
}
impl TcpClient {
    #[cfg(feature = "sync")]
    pub fn try_new_sync(params: &ConnectParams, config: &ConnectionConfiguration) -> MdbResult<Self> {
        let start = Instant::now();
        trace!("TcpClient: Connecting to {}", params.address());
        let stream = params
            .stream_factory()
            .connect_sync(params.address(), config)?;
        let tcp_client = Self::Sync(SyncTcpClient::new(stream, config.buffer_size()));
        trace!(
            "Connection of type {} is initialized ({} µs)",
            tcp_client.s_type(),
            Instant::now().duration_since(start).as_micros(),
        );
        Ok(tcp_client)
    }

    #[cfg(feature = "async")]
    pub async fn try_new_async(
        params: &ConnectParams,
        config: &ConnectionConfiguration,
    ) -> MdbResult<Self> {
        let start = Instant::now();
        trace!("TcpClient: Connecting to {}", params.address());
        let stream = params
            .stream_factory()
            .connect_async(params.address(), config)
            .await?;
        let tcp_client = Self::Async(AsyncTcpClient::new(
            stream,
            config.buffer_size(),
            config.read_timeout(),
        ));
        trace!(
            "Connection of type {} is initialized ({} µs)",
            tcp_client.s_type(),
            Instant::now().duration_since(start).as_micros(),
        );
        Ok(tcp_client)
    }

    // Returns a descriptor of the chosen type
    pub fn s_type(&self) -> &'static str {
        match self {
            #[cfg(feature = "sync")]
            Self::Sync(_) => "Sync",
            #[cfg(feature = "async")]
            Self::Async(_) => "Async",
            Self::Dead { .. } => "Physical connection lost",
        }
    }

    pub fn die<S: Into<String>>(&mut self, reason: S) {
        *self = Self::Dead {
            reason: reason.into(),
        };
    }

    pub fn has_died(&self) -> bool {
        matches!(self, Self::Dead { .. })
    }
}
