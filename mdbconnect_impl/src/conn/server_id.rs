use crate::{MdbError, MdbResult};
use rand::RngCore;
use std::sync::atomic::{AtomicU32, Ordering};

/// The port a server listens on if nothing else is specified.
pub const DEFAULT_PORT: u16 = 27017;

/// Host and port of a server.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerAddress {
    host: String,
    port: u16,
}
impl ServerAddress {
    /// Constructor.
    pub fn new<S: AsRef<str>>(host: S, port: u16) -> Self {
        Self {
            host: host.as_ref().to_lowercase(),
            port,
        }
    }

    /// Parses `host` or `host:port`.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if the port is not a number or the host is empty.
    pub fn parse(s: &str) -> MdbResult<Self> {
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|_| usage_err!("invalid port in server address {s}"))?,
            ),
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(usage_err!("empty host in server address {s}"));
        }
        Ok(Self::new(host, port))
    }

    /// The host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }
}
impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
impl std::str::FromStr for ServerAddress {
    type Err = MdbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identifies a client-side view of a cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClusterId {
    value: String,
    description: Option<String>,
}
impl ClusterId {
    /// Creates a cluster id with a random value.
    pub fn new() -> Self {
        let mut bytes = [0_u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            value: hex::encode(bytes),
            description: None,
        }
    }

    /// Creates a cluster id with a random value and a user-supplied description.
    pub fn with_description<S: Into<String>>(description: S) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::new()
        }
    }

    /// The random value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The description, if one was given.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
impl Default for ClusterId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies a server within a cluster view.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerId {
    cluster_id: ClusterId,
    address: ServerAddress,
}
impl ServerId {
    /// Constructor.
    pub fn new(cluster_id: ClusterId, address: ServerAddress) -> Self {
        Self {
            cluster_id,
            address,
        }
    }
    /// The cluster id.
    pub fn cluster_id(&self) -> &ClusterId {
        &self.cluster_id
    }
    /// The server address.
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }
}
impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.address, self.cluster_id.value)
    }
}

static NEXT_LOCAL_VALUE: AtomicU32 = AtomicU32::new(1);

/// Identifies a connection.
///
/// The local value is assigned from a process-wide counter when the id is created;
/// the server value is only known after the handshake.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    server_id: ServerId,
    local_value: u32,
    server_value: Option<i32>,
}
impl ConnectionId {
    /// Creates a new id with a fresh local value.
    pub fn new(server_id: ServerId) -> Self {
        Self {
            server_id,
            local_value: NEXT_LOCAL_VALUE.fetch_add(1, Ordering::Relaxed),
            server_value: None,
        }
    }

    /// Returns a copy that carries the value the server assigned to this connection.
    #[must_use]
    pub fn with_server_value(&self, server_value: i32) -> Self {
        Self {
            server_value: Some(server_value),
            ..self.clone()
        }
    }

    /// The server id.
    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }
    /// The locally assigned value.
    pub fn local_value(&self) -> u32 {
        self.local_value
    }
    /// The value assigned by the server, if the handshake reported one.
    pub fn server_value(&self) -> Option<i32> {
        self.server_value
    }
}
impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.server_value {
            Some(sv) => write!(f, "conn{}/{sv}", self.local_value),
            None => write!(f, "conn{}", self.local_value),
        }
    }
}
