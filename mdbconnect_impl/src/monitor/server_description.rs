use crate::{
    conn::{ConnectionDescription, HandshakeReply, ServerAddress, ServerType},
    MdbError,
};
use bson::oid::ObjectId;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};

/// The externally visible state of a server monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    /// There is no successful heartbeat yet, or the last one failed.
    Connecting,
    /// The last heartbeat succeeded.
    Connected,
}

/// What the monitor knows about a server, as of its latest heartbeat.
///
/// A description is never modified; each heartbeat produces a new one.
#[derive(Clone, Debug)]
pub struct ServerDescription {
    address: ServerAddress,
    state: ServerState,
    server_type: ServerType,
    tags: BTreeMap<String, String>,
    hosts: BTreeSet<String>,
    passives: BTreeSet<String>,
    arbiters: BTreeSet<String>,
    set_name: Option<String>,
    set_version: Option<i32>,
    election_id: Option<ObjectId>,
    primary: Option<String>,
    min_wire_version: i32,
    max_wire_version: i32,
    max_document_size: usize,
    max_message_size: usize,
    max_batch_count: usize,
    round_trip_time: Option<Duration>,
    ok: bool,
    error: Option<Arc<MdbError>>,
}

impl ServerDescription {
    /// The description of a server that was not yet reached.
    pub fn connecting(address: ServerAddress) -> Self {
        Self {
            address,
            state: ServerState::Connecting,
            server_type: ServerType::Unknown,
            tags: BTreeMap::new(),
            hosts: BTreeSet::new(),
            passives: BTreeSet::new(),
            arbiters: BTreeSet::new(),
            set_name: None,
            set_version: None,
            election_id: None,
            primary: None,
            min_wire_version: 0,
            max_wire_version: 0,
            max_document_size: ConnectionDescription::DEFAULT_MAX_DOCUMENT_SIZE,
            max_message_size: ConnectionDescription::DEFAULT_MAX_MESSAGE_SIZE,
            max_batch_count: ConnectionDescription::DEFAULT_MAX_BATCH_COUNT,
            round_trip_time: None,
            ok: false,
            error: None,
        }
    }

    pub(crate) fn failed(address: ServerAddress, error: MdbError) -> Self {
        Self {
            error: Some(Arc::new(error)),
            ..Self::connecting(address)
        }
    }

    pub(crate) fn connected(
        address: ServerAddress,
        reply: &HandshakeReply,
        round_trip_time: Duration,
    ) -> Self {
        let set = |hosts: &Option<Vec<String>>| {
            hosts
                .iter()
                .flatten()
                .map(|h| h.to_lowercase())
                .collect::<BTreeSet<_>>()
        };
        let limit = |value: Option<i32>, default: usize| {
            value
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        Self {
            address,
            state: ServerState::Connected,
            server_type: reply.server_type(),
            tags: reply.tags.clone().unwrap_or_default(),
            hosts: set(&reply.hosts),
            passives: set(&reply.passives),
            arbiters: set(&reply.arbiters),
            set_name: reply.set_name.clone(),
            set_version: reply.set_version,
            election_id: reply.election_id,
            primary: reply.primary.clone(),
            min_wire_version: reply.min_wire_version,
            max_wire_version: reply.max_wire_version,
            max_document_size: limit(
                reply.max_bson_object_size,
                ConnectionDescription::DEFAULT_MAX_DOCUMENT_SIZE,
            ),
            max_message_size: limit(
                reply.max_message_size_bytes,
                ConnectionDescription::DEFAULT_MAX_MESSAGE_SIZE,
            ),
            max_batch_count: limit(
                reply.max_write_batch_size,
                ConnectionDescription::DEFAULT_MAX_BATCH_COUNT,
            ),
            round_trip_time: Some(round_trip_time),
            ok: true,
            error: None,
        }
    }

    /// True if a listener has to learn about the step from `previous` to `self`.
    ///
    /// Round trip times and size limits are not considered.
    pub fn changed_from(&self, previous: &Self) -> bool {
        self.address != previous.address
            || self.state != previous.state
            || self.server_type != previous.server_type
            || self.tags != previous.tags
            || self.hosts != previous.hosts
            || self.passives != previous.passives
            || self.arbiters != previous.arbiters
            || self.set_name != previous.set_name
            || self.set_version != previous.set_version
            || self.election_id != previous.election_id
            || self.primary != previous.primary
            || self.ok != previous.ok
            || !same_error(self.error.as_deref(), previous.error.as_deref())
    }

    /// The address of the server.
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }
    /// Connecting or Connected.
    pub fn state(&self) -> ServerState {
        self.state
    }
    /// The role of the server.
    pub fn server_type(&self) -> ServerType {
        self.server_type
    }
    /// The tags of a replica set member.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
    /// The replica set members that can become primary.
    pub fn hosts(&self) -> &BTreeSet<String> {
        &self.hosts
    }
    /// The replica set members with priority 0.
    pub fn passives(&self) -> &BTreeSet<String> {
        &self.passives
    }
    /// The arbiters of the replica set.
    pub fn arbiters(&self) -> &BTreeSet<String> {
        &self.arbiters
    }
    /// The name of the replica set.
    pub fn set_name(&self) -> Option<&str> {
        self.set_name.as_deref()
    }
    /// The configuration version of the replica set.
    pub fn set_version(&self) -> Option<i32> {
        self.set_version
    }
    /// The election id of a primary.
    pub fn election_id(&self) -> Option<&ObjectId> {
        self.election_id.as_ref()
    }
    /// The primary, as seen by this server.
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }
    /// The oldest wire protocol version the server speaks.
    pub fn min_wire_version(&self) -> i32 {
        self.min_wire_version
    }
    /// The newest wire protocol version the server speaks.
    pub fn max_wire_version(&self) -> i32 {
        self.max_wire_version
    }
    /// The largest document the server accepts.
    pub fn max_document_size(&self) -> usize {
        self.max_document_size
    }
    /// The largest message the server accepts.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
    /// The maximal number of items of a write command.
    pub fn max_batch_count(&self) -> usize {
        self.max_batch_count
    }
    /// The smoothed heartbeat round trip time.
    pub fn round_trip_time(&self) -> Option<Duration> {
        self.round_trip_time
    }
    /// True if the last heartbeat succeeded.
    pub fn is_ok(&self) -> bool {
        self.ok
    }
    /// The error of the last heartbeat, or of the attempt to connect.
    pub fn error(&self) -> Option<&MdbError> {
        self.error.as_deref()
    }
}

// Errors are equal for this purpose if they are of the same kind and read the same.
fn same_error(e1: Option<&MdbError>, e2: Option<&MdbError>) -> bool {
    match (e1, e2) {
        (None, None) => true,
        (Some(e1), Some(e2)) => {
            std::mem::discriminant(e1) == std::mem::discriminant(e2)
                && e1.to_string() == e2.to_string()
        }
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::{ServerDescription, ServerState};
    use crate::{
        conn::{HandshakeReply, ServerAddress, ServerType},
        MdbError,
    };
    use bson::doc;
    use std::time::Duration;

    fn reply(document: bson::Document) -> HandshakeReply {
        HandshakeReply::parse(document).unwrap()
    }

    #[test]
    fn test_changed_from() {
        let address = ServerAddress::new("db1", 27017);
        let primary = reply(doc! {
            "ismaster": true, "setName": "rs0", "setVersion": 1,
            "hosts": ["db1:27017", "db2:27017"], "maxWireVersion": 6,
        });
        let connected =
            ServerDescription::connected(address.clone(), &primary, Duration::from_millis(3));
        assert_eq!(connected.state(), ServerState::Connected);
        assert_eq!(connected.server_type(), ServerType::ReplicaSetPrimary);
        assert!(connected.changed_from(&ServerDescription::connecting(address.clone())));

        // a different round trip time is no change
        let again = ServerDescription::connected(address.clone(), &primary, Duration::from_millis(9));
        assert!(!again.changed_from(&connected));

        // the host list is compared as a set
        let reordered = reply(doc! {
            "ismaster": true, "setName": "rs0", "setVersion": 1,
            "hosts": ["DB2:27017", "db1:27017"], "maxWireVersion": 6,
        });
        let reordered =
            ServerDescription::connected(address.clone(), &reordered, Duration::from_millis(3));
        assert!(!reordered.changed_from(&connected));

        let reconfigured = reply(doc! {
            "ismaster": true, "setName": "rs0", "setVersion": 2,
            "hosts": ["db1:27017", "db2:27017"], "maxWireVersion": 6,
        });
        let reconfigured =
            ServerDescription::connected(address.clone(), &reconfigured, Duration::from_millis(3));
        assert!(reconfigured.changed_from(&connected));
    }

    #[test]
    fn test_errors_are_compared_by_kind_and_message() {
        let address = ServerAddress::new("db1", 27017);
        let broken = |msg: &'static str| {
            ServerDescription::failed(address.clone(), MdbError::ConnectionBroken(msg.into()))
        };
        assert!(!broken("reset").changed_from(&broken("reset")));
        assert!(broken("reset").changed_from(&broken("refused")));
        assert!(broken("reset").changed_from(&ServerDescription::connecting(address.clone())));
        assert!(broken("reset").error().is_some());
        assert!(!broken("reset").is_ok());
    }
}
