use crate::{conn::AsyncStream, MdbResult};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};

#[derive(Debug)]
pub(crate) struct AsyncTcpClient {
    stream: BufReader<Box<dyn AsyncStream>>,
    read_timeout: Option<Duration>,
}

impl AsyncTcpClient {
    pub fn new(
        stream: Box<dyn AsyncStream>,
        buffer_size: usize,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            stream: BufReader::with_capacity(buffer_size, stream),
            read_timeout,
        }
    }

    pub async fn write_all(&mut self, message: &[u8]) -> std::io::Result<()> {
        let writer = self.stream.get_mut();
        writer.write_all(message).await?;
        writer.flush().await
    }

    pub async fn read_message(&mut self, max_message_size: usize) -> MdbResult<Vec<u8>> {
        let read = crate::protocol::util_async::read_message(&mut self.stream, max_message_size);
        match self.read_timeout {
            Some(read_timeout) => tokio::time::timeout(read_timeout, read).await.map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out")
            })?,
            None => read.await,
        }
    }
}
