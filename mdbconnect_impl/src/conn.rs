pub(crate) mod authentication;
mod connect_params;
mod connection_configuration;
mod connection_core;
mod connection_description;
mod connection_statistics;
#[cfg(test)]
pub(crate) mod fake_wire_connection;
mod handshake;
mod server_id;
mod stream_factory;
mod tcp_client;
mod wire_connection;

pub use self::{
    authentication::{authenticator_for, Authenticator},
    connect_params::{AuthMechanism, ConnectParams, Credential},
    connection_configuration::ConnectionConfiguration,
    connection_core::{ConnectionCore, ConnectionCoreFactory},
    connection_description::{ConnectionDescription, ServerType, ServerVersion},
    connection_statistics::ConnectionStatistics,
    handshake::HandshakeReply,
    server_id::{ClusterId, ConnectionId, ServerAddress, ServerId, DEFAULT_PORT},
    stream_factory::{StreamFactory, TcpStreamFactory},
    wire_connection::ConnectionInfo,
};
#[cfg(feature = "async")]
pub use self::{
    stream_factory::AsyncStream,
    wire_connection::{run_command_async, AsyncWireConnection},
};
#[cfg(feature = "sync")]
pub use self::{
    stream_factory::SyncStream,
    wire_connection::{run_command_sync, WireConnection},
};
#[cfg(feature = "async")]
pub(crate) use self::wire_connection::roundtrip_async;
#[cfg(feature = "sync")]
pub(crate) use self::wire_connection::roundtrip_sync;
pub(crate) use self::tcp_client::TcpClient;
