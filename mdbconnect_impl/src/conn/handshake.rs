use crate::{conn::ServerType, MdbResult};
use bson::{doc, oid::ObjectId, Document};
use serde::Deserialize;
use std::collections::BTreeMap;

// The first command on a new connection; it introduces the client to the server.
pub(crate) fn handshake_command(application_name: Option<&str>) -> Document {
    let mut client = doc! {
        "driver": { "name": "mdbconnect", "version": env!("CARGO_PKG_VERSION") },
        "os": { "type": std::env::consts::OS, "architecture": std::env::consts::ARCH },
    };
    if let Some(name) = application_name {
        client.insert("application", doc! { "name": name });
    }
    doc! { "isMaster": 1, "client": client }
}

// The periodic probe of the server monitor.
pub(crate) fn heartbeat_command() -> Document {
    doc! { "isMaster": 1 }
}

pub(crate) fn build_info_command() -> Document {
    doc! { "buildInfo": 1 }
}

/// The parts of an `isMaster` reply that the driver evaluates.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeReply {
    #[serde(default)]
    pub(crate) ismaster: bool,
    pub(crate) secondary: Option<bool>,
    pub(crate) arbiter_only: Option<bool>,
    pub(crate) isreplicaset: Option<bool>,
    pub(crate) msg: Option<String>,
    pub(crate) set_name: Option<String>,
    pub(crate) set_version: Option<i32>,
    pub(crate) election_id: Option<ObjectId>,
    pub(crate) primary: Option<String>,
    pub(crate) me: Option<String>,
    pub(crate) hosts: Option<Vec<String>>,
    pub(crate) passives: Option<Vec<String>>,
    pub(crate) arbiters: Option<Vec<String>>,
    pub(crate) tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub(crate) min_wire_version: i32,
    #[serde(default)]
    pub(crate) max_wire_version: i32,
    pub(crate) max_bson_object_size: Option<i32>,
    pub(crate) max_message_size_bytes: Option<i32>,
    pub(crate) max_write_batch_size: Option<i32>,
    pub(crate) connection_id: Option<i32>,
}
impl HandshakeReply {
    pub(crate) fn parse(document: Document) -> MdbResult<Self> {
        Ok(bson::from_document(document)?)
    }

    /// Derives the server type from the reply.
    pub fn server_type(&self) -> ServerType {
        match self {
            Self { msg: Some(msg), .. } if msg == "isdbgrid" => ServerType::ShardRouter,
            Self {
                set_name: Some(_),
                ismaster: true,
                ..
            } => ServerType::ReplicaSetPrimary,
            Self {
                set_name: Some(_),
                secondary: Some(true),
                ..
            } => ServerType::ReplicaSetSecondary,
            Self {
                set_name: Some(_),
                arbiter_only: Some(true),
                ..
            } => ServerType::ReplicaSetArbiter,
            Self {
                set_name: Some(_), ..
            } => ServerType::ReplicaSetOther,
            Self {
                isreplicaset: Some(true),
                ..
            } => ServerType::ReplicaSetGhost,
            _ => ServerType::Standalone,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildInfoReply {
    #[serde(default)]
    pub(crate) version_array: Vec<i32>,
}
impl BuildInfoReply {
    pub(crate) fn parse(document: Document) -> MdbResult<Self> {
        Ok(bson::from_document(document)?)
    }
}
