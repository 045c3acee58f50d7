use crate::{
    conn::{ConnectionConfiguration, ServerAddress},
    MdbResult,
};
#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "sync")]
use std::net::{TcpStream, ToSocketAddrs};

/// A blocking duplex byte stream.
#[cfg(feature = "sync")]
pub trait SyncStream: std::io::Read + std::io::Write + Send + std::fmt::Debug {}
#[cfg(feature = "sync")]
impl<T: std::io::Read + std::io::Write + Send + std::fmt::Debug> SyncStream for T {}

/// A non-blocking duplex byte stream.
#[cfg(feature = "async")]
pub trait AsyncStream:
    tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + std::fmt::Debug
{
}
#[cfg(feature = "async")]
impl<T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + std::fmt::Debug> AsyncStream
    for T
{
}

/// Opens the byte streams that connections run on.
///
/// The driver brings [`TcpStreamFactory`] for plain TCP; an implementation that wraps
/// the stream into TLS can be plugged in via
/// [`ConnectParams::with_stream_factory`](crate::ConnectParams::with_stream_factory).
#[cfg_attr(feature = "async", async_trait)]
pub trait StreamFactory: Send + Sync + std::fmt::Debug {
    /// Opens a blocking stream.
    #[cfg(feature = "sync")]
    fn connect_sync(
        &self,
        address: &ServerAddress,
        config: &ConnectionConfiguration,
    ) -> MdbResult<Box<dyn SyncStream>>;

    /// Opens a non-blocking stream.
    #[cfg(feature = "async")]
    async fn connect_async(
        &self,
        address: &ServerAddress,
        config: &ConnectionConfiguration,
    ) -> MdbResult<Box<dyn AsyncStream>>;
}

/// Plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpStreamFactory;

#[cfg_attr(feature = "async", async_trait)]
impl StreamFactory for TcpStreamFactory {
    #[cfg(feature = "sync")]
    fn connect_sync(
        &self,
        address: &ServerAddress,
        config: &ConnectionConfiguration,
    ) -> MdbResult<Box<dyn SyncStream>> {
        let mut last_error = None;
        for socket_addr in (address.host(), address.port()).to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, config.connect_timeout()) {
                Ok(tcp_stream) => {
                    tcp_stream.set_nodelay(config.is_tcp_nodelay())?;
                    tcp_stream.set_read_timeout(config.read_timeout())?;
                    return Ok(Box::new(tcp_stream));
                }
                Err(e) => {
                    trace!("connecting to {socket_addr} failed with {e}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{address} did not resolve to any socket address"),
                )
            })
            .into())
    }

    #[cfg(feature = "async")]
    async fn connect_async(
        &self,
        address: &ServerAddress,
        config: &ConnectionConfiguration,
    ) -> MdbResult<Box<dyn AsyncStream>> {
        let tcp_stream = tokio::time::timeout(
            config.connect_timeout(),
            tokio::net::TcpStream::connect((address.host(), address.port())),
        )
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connecting to {address} timed out"),
            )
        })??;
        tcp_stream.set_nodelay(config.is_tcp_nodelay())?;
        Ok(Box::new(tcp_stream))
    }
}
