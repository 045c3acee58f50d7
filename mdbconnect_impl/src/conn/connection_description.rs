use crate::conn::{ConnectionId, HandshakeReply};

/// The role a server plays, as derived from its handshake reply.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum ServerType {
    /// A server that is not part of a replica set.
    Standalone,
    /// A router in front of a sharded cluster.
    ShardRouter,
    /// The primary of a replica set.
    ReplicaSetPrimary,
    /// A secondary of a replica set.
    ReplicaSetSecondary,
    /// An arbiter of a replica set.
    ReplicaSetArbiter,
    /// A replica set member that is neither primary, secondary nor arbiter.
    ReplicaSetOther,
    /// A replica set member that has not yet received its configuration.
    ReplicaSetGhost,
    /// Not (yet) known.
    #[default]
    Unknown,
}
impl ServerType {
    /// True for all replica set roles.
    pub fn is_replica_set_member(self) -> bool {
        matches!(
            self,
            Self::ReplicaSetPrimary
                | Self::ReplicaSetSecondary
                | Self::ReplicaSetArbiter
                | Self::ReplicaSetOther
                | Self::ReplicaSetGhost
        )
    }
}

/// Version of a server, as reported by `buildInfo`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct ServerVersion(Vec<i32>);
impl ServerVersion {
    /// Constructor.
    pub fn new(version_array: Vec<i32>) -> Self {
        Self(version_array)
    }
    /// Returns true if this version is at least `major.minor`.
    pub fn at_least(&self, major: i32, minor: i32) -> bool {
        let own_major = self.0.first().copied().unwrap_or(0);
        let own_minor = self.0.get(1).copied().unwrap_or(0);
        (own_major, own_minor) >= (major, minor)
    }
    /// The version array.
    pub fn version_array(&self) -> &[i32] {
        &self.0
    }
}
impl std::fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Immutable snapshot of what a connection learned during its handshake.
///
/// The size limits are consumed by the message encoders to compute split points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescription {
    connection_id: ConnectionId,
    server_version: ServerVersion,
    server_type: ServerType,
    max_wire_version: i32,
    max_batch_count: usize,
    max_document_size: usize,
    max_message_size: usize,
}
impl ConnectionDescription {
    /// Used if the server does not report a document size limit.
    pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;
    /// Used if the server does not report a message size limit.
    pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 48_000_000;
    /// Used if the server does not report a batch size limit.
    pub const DEFAULT_MAX_BATCH_COUNT: usize = 1000;

    /// Constructor with default limits.
    pub fn new(connection_id: ConnectionId, server_version: ServerVersion) -> Self {
        Self {
            connection_id,
            server_version,
            server_type: ServerType::Unknown,
            max_wire_version: 0,
            max_batch_count: Self::DEFAULT_MAX_BATCH_COUNT,
            max_document_size: Self::DEFAULT_MAX_DOCUMENT_SIZE,
            max_message_size: Self::DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub(crate) fn from_handshake(
        connection_id: ConnectionId,
        server_version: ServerVersion,
        reply: &HandshakeReply,
    ) -> Self {
        let connection_id = match reply.connection_id {
            Some(server_value) => connection_id.with_server_value(server_value),
            None => connection_id,
        };
        let limit = |value: Option<i32>, default: usize| {
            value
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        Self {
            connection_id,
            server_version,
            server_type: reply.server_type(),
            max_wire_version: reply.max_wire_version,
            max_batch_count: limit(reply.max_write_batch_size, Self::DEFAULT_MAX_BATCH_COUNT),
            max_document_size: limit(reply.max_bson_object_size, Self::DEFAULT_MAX_DOCUMENT_SIZE),
            max_message_size: limit(reply.max_message_size_bytes, Self::DEFAULT_MAX_MESSAGE_SIZE),
        }
    }

    /// Sets the limits explicitly.
    #[must_use]
    pub fn with_limits(
        mut self,
        max_batch_count: usize,
        max_document_size: usize,
        max_message_size: usize,
    ) -> Self {
        self.max_batch_count = max_batch_count;
        self.max_document_size = max_document_size;
        self.max_message_size = max_message_size;
        self
    }

    /// Sets the highest wire protocol version the server supports.
    #[must_use]
    pub fn with_max_wire_version(mut self, max_wire_version: i32) -> Self {
        self.max_wire_version = max_wire_version;
        self
    }

    /// The id of the described connection.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }
    /// The server version.
    pub fn server_version(&self) -> &ServerVersion {
        &self.server_version
    }
    /// The server type.
    pub fn server_type(&self) -> ServerType {
        self.server_type
    }
    /// The highest wire protocol version the server supports.
    pub fn max_wire_version(&self) -> i32 {
        self.max_wire_version
    }
    /// Maximal number of items in a single write command.
    pub fn max_batch_count(&self) -> usize {
        self.max_batch_count
    }
    /// Maximal size of a single document.
    pub fn max_document_size(&self) -> usize {
        self.max_document_size
    }
    /// Maximal size of a single message.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Write commands exist since wire version 2.
    pub fn supports_write_commands(&self) -> bool {
        self.max_wire_version >= 2
    }
}
