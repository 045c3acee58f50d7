use std::time::Duration;

/// Socket-level settings of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfiguration {
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    buffer_size: usize,
    tcp_nodelay: bool,
}

impl Default for ConnectionConfiguration {
    fn default() -> Self {
        Self {
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            tcp_nodelay: true,
        }
    }
}
impl ConnectionConfiguration {
    /// Default value for the time that establishing the socket may take.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default value for the time a read may block; `None` blocks forever.
    pub const DEFAULT_READ_TIMEOUT: Option<Duration> = None;

    /// Minimal size of the read buffer.
    pub const MIN_BUFFER_SIZE: usize = 1024;

    /// Default size of the read buffer.
    ///
    /// Replies larger than the buffer are read in several chunks.
    pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

    /// Returns the connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
    /// Sets the connect timeout.
    pub fn set_connect_timeout(&mut self, connect_timeout: Duration) {
        self.connect_timeout = connect_timeout;
    }
    /// Builder-method for setting the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns the read timeout.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }
    /// Sets the read timeout.
    pub fn set_read_timeout(&mut self, read_timeout: Option<Duration>) {
        self.read_timeout = read_timeout;
    }
    /// Builder-method for setting the read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Returns the size of the read buffer.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
    /// Sets the size of the read buffer.
    ///
    /// Values below [`ConnectionConfiguration::MIN_BUFFER_SIZE`] are raised to it.
    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.buffer_size = std::cmp::max(buffer_size, Self::MIN_BUFFER_SIZE);
    }
    /// Builder-method for setting the size of the read buffer.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.set_buffer_size(buffer_size);
        self
    }

    /// Returns whether Nagle's algorithm is switched off.
    pub fn is_tcp_nodelay(&self) -> bool {
        self.tcp_nodelay
    }
    /// Builder-method for switching Nagle's algorithm off or on.
    #[must_use]
    pub fn with_tcp_nodelay(mut self, tcp_nodelay: bool) -> Self {
        self.tcp_nodelay = tcp_nodelay;
        self
    }
}
