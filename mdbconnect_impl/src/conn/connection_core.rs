use crate::{
    conn::{
        handshake::{build_info_command, handshake_command, heartbeat_command, BuildInfoReply},
        ConnectParams, ConnectionConfiguration, ConnectionDescription, ConnectionId,
        ConnectionInfo, ConnectionStatistics, HandshakeReply, ServerId, ServerVersion, TcpClient,
    },
    pool::{ConnectionFactory, ManagedConnection},
    protocol::Reply,
    MdbError, MdbResult,
};
#[cfg(feature = "async")]
use crate::{
    conn::{authentication::authenticate_async, run_command_async, AsyncWireConnection},
    monitor::AsyncHeartbeat,
    pool::AsyncOpen,
};
#[cfg(feature = "sync")]
use crate::{
    conn::{authentication::authenticate_sync, run_command_sync, WireConnection},
    monitor::SyncHeartbeat,
    pool::SyncOpen,
};
#[cfg(feature = "async")]
use async_trait::async_trait;
use std::{borrow::Cow, time::Instant};

const ADMIN_DATABASE: &str = "admin";

/// A physical connection to a server.
///
/// A new instance is not yet connected; opening it connects the stream, runs the
/// handshake, and authenticates if the connect parameters carry a credential.
#[derive(Debug)]
pub struct ConnectionCore {
    id: ConnectionId,
    params: ConnectParams,
    config: ConnectionConfiguration,
    tcp_client: TcpClient,
    description: Option<ConnectionDescription>,
    statistics: ConnectionStatistics,
    opened: bool,
    closed: bool,
}

impl ConnectionCore {
    /// Creates an unopened connection.
    pub fn new(server_id: ServerId, params: ConnectParams, config: ConnectionConfiguration) -> Self {
        Self {
            id: ConnectionId::new(server_id),
            params,
            config,
            tcp_client: TcpClient::Dead {
                reason: "not yet opened".to_string(),
            },
            description: None,
            statistics: ConnectionStatistics::new(),
            opened: false,
            closed: false,
        }
    }

    /// The id of the connection; it carries the server's value once the handshake is done.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The parameters the connection was created with.
    pub fn connect_params(&self) -> &ConnectParams {
        &self.params
    }

    /// Traffic counters of this connection.
    pub fn statistics(&self) -> &ConnectionStatistics {
        &self.statistics
    }

    /// Resets the traffic counters.
    pub fn reset_statistics(&mut self) {
        self.statistics.reset();
    }

    fn check_open_allowed(&self) -> MdbResult<bool> {
        if self.closed {
            Err(usage_err!("connection {} is closed", self.id))
        } else {
            Ok(!self.opened)
        }
    }

    fn max_message_size(&self) -> usize {
        self.description.as_ref().map_or(
            ConnectionDescription::DEFAULT_MAX_MESSAGE_SIZE,
            ConnectionDescription::max_message_size,
        )
    }

    fn broken(&self) -> MdbError {
        match self.tcp_client {
            TcpClient::Dead { ref reason } => MdbError::ConnectionBroken(Cow::Owned(reason.clone())),
            _ => MdbError::ConnectionBroken(Cow::Borrowed("connection is not usable")),
        }
    }

    // Any failure on the stream leaves it in an unknown position.
    fn discard(&mut self, e: &MdbError) {
        info!("connection {} discarded after \"{e}\"", self.id);
        self.tcp_client.die(e.to_string());
    }

    fn describe(&mut self, handshake: &HandshakeReply, build_info: BuildInfoReply) {
        let description = ConnectionDescription::from_handshake(
            self.id.clone(),
            ServerVersion::new(build_info.version_array),
            handshake,
        );
        self.id = description.connection_id().clone();
        debug!(
            "connection {} describes server {} version {} as {:?}",
            self.id,
            self.params.address(),
            description.server_version(),
            description.server_type()
        );
        self.description = Some(description);
    }

    fn parse_reply(&mut self, bytes: &[u8], response_to: i32, start: Instant) -> MdbResult<Reply> {
        self.statistics
            .add_received(bytes.len(), Instant::now().duration_since(start));
        Reply::parse(bytes, response_to).map_err(|e| {
            self.discard(&e);
            e
        })
    }

    #[cfg(feature = "sync")]
    fn initialize_sync(&mut self) -> MdbResult<()> {
        let command = handshake_command(self.params.application_name());
        let handshake = HandshakeReply::parse(run_command_sync(self, ADMIN_DATABASE, command)?)?;
        let build_info =
            BuildInfoReply::parse(run_command_sync(self, ADMIN_DATABASE, build_info_command())?)?;
        self.describe(&handshake, build_info);
        if let (Some(credential), Some(description)) =
            (self.params.credential().cloned(), self.description.clone())
        {
            authenticate_sync(self, &credential, &description)?;
        }
        Ok(())
    }

    #[cfg(feature = "async")]
    async fn initialize_async(&mut self) -> MdbResult<()> {
        let command = handshake_command(self.params.application_name());
        let handshake =
            HandshakeReply::parse(run_command_async(self, ADMIN_DATABASE, command).await?)?;
        let build_info = BuildInfoReply::parse(
            run_command_async(self, ADMIN_DATABASE, build_info_command()).await?,
        )?;
        self.describe(&handshake, build_info);
        if let (Some(credential), Some(description)) =
            (self.params.credential().cloned(), self.description.clone())
        {
            authenticate_async(self, &credential, &description).await?;
        }
        Ok(())
    }
}

impl ConnectionInfo for ConnectionCore {
    fn description(&self) -> Option<&ConnectionDescription> {
        self.description.as_ref()
    }
}

impl ManagedConnection for ConnectionCore {
    fn is_opened(&self) -> bool {
        self.opened
    }

    fn is_closed(&self) -> bool {
        self.closed || (self.opened && self.tcp_client.has_died())
    }

    fn close(&mut self) {
        if !self.closed {
            debug!("closing connection {}", self.id);
            self.closed = true;
            // dropping the stream closes the socket
            self.tcp_client.die("closed");
        }
    }
}

#[cfg(feature = "sync")]
impl SyncOpen for ConnectionCore {
    fn open_sync(&mut self) -> MdbResult<()> {
        if !self.check_open_allowed()? {
            return Ok(());
        }
        let start = Instant::now();
        self.tcp_client = TcpClient::try_new_sync(&self.params, &self.config)?;
        if let Err(e) = self.initialize_sync() {
            self.discard(&e);
            return Err(e);
        }
        self.opened = true;
        debug!(
            "opened connection {} in {} µs",
            self.id,
            Instant::now().duration_since(start).as_micros()
        );
        Ok(())
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncOpen for ConnectionCore {
    async fn open_async(&mut self) -> MdbResult<()> {
        if !self.check_open_allowed()? {
            return Ok(());
        }
        let start = Instant::now();
        self.tcp_client = TcpClient::try_new_async(&self.params, &self.config).await?;
        if let Err(e) = self.initialize_async().await {
            self.discard(&e);
            return Err(e);
        }
        self.opened = true;
        debug!(
            "opened connection {} in {} µs",
            self.id,
            Instant::now().duration_since(start).as_micros()
        );
        Ok(())
    }
}

#[cfg(feature = "sync")]
impl WireConnection for ConnectionCore {
    fn send_message_sync(&mut self, message: &[u8], last_request_id: i32) -> MdbResult<()> {
        let writer = match self.tcp_client {
            TcpClient::Sync(ref mut cl) => cl.writer(),
            TcpClient::Dead { .. } => return Err(self.broken()),
            #[cfg(feature = "async")]
            TcpClient::Async(_) => {
                return Err(usage_err!("a connection opened non-blocking cannot send blocking"));
            }
        };
        if let Err(e) = writer.write_all(message).and_then(|()| writer.flush()) {
            let e = MdbError::from(e);
            self.discard(&e);
            return Err(e);
        }
        self.statistics.add_sent(message.len());
        trace!(
            "connection {} sent {} bytes up to request {last_request_id}",
            self.id,
            message.len()
        );
        Ok(())
    }

    fn receive_message_sync(&mut self, response_to: i32) -> MdbResult<Reply> {
        let start = Instant::now();
        let max_message_size = self.max_message_size();
        let reader = match self.tcp_client {
            TcpClient::Sync(ref mut cl) => cl.reader(),
            TcpClient::Dead { .. } => return Err(self.broken()),
            #[cfg(feature = "async")]
            TcpClient::Async(_) => {
                return Err(usage_err!(
                    "a connection opened non-blocking cannot receive blocking"
                ));
            }
        };
        match crate::protocol::util_sync::read_message(reader, max_message_size) {
            Ok(bytes) => self.parse_reply(&bytes, response_to, start),
            Err(e) => {
                self.discard(&e);
                Err(e)
            }
        }
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncWireConnection for ConnectionCore {
    async fn send_message_async(&mut self, message: &[u8], last_request_id: i32) -> MdbResult<()> {
        let client = match self.tcp_client {
            TcpClient::Async(ref mut cl) => cl,
            TcpClient::Dead { .. } => return Err(self.broken()),
            #[cfg(feature = "sync")]
            TcpClient::Sync(_) => {
                return Err(usage_err!("a connection opened blocking cannot send non-blocking"));
            }
        };
        if let Err(e) = client.write_all(message).await {
            let e = MdbError::from(e);
            self.discard(&e);
            return Err(e);
        }
        self.statistics.add_sent(message.len());
        trace!(
            "connection {} sent {} bytes up to request {last_request_id}",
            self.id,
            message.len()
        );
        Ok(())
    }

    async fn receive_message_async(&mut self, response_to: i32) -> MdbResult<Reply> {
        let start = Instant::now();
        let max_message_size = self.max_message_size();
        let client = match self.tcp_client {
            TcpClient::Async(ref mut cl) => cl,
            TcpClient::Dead { .. } => return Err(self.broken()),
            #[cfg(feature = "sync")]
            TcpClient::Sync(_) => {
                return Err(usage_err!(
                    "a connection opened blocking cannot receive non-blocking"
                ));
            }
        };
        match client.read_message(max_message_size).await {
            Ok(bytes) => self.parse_reply(&bytes, response_to, start),
            Err(e) => {
                self.discard(&e);
                Err(e)
            }
        }
    }
}

#[cfg(feature = "sync")]
impl SyncHeartbeat for ConnectionCore {
    fn heartbeat_sync(&mut self) -> MdbResult<HandshakeReply> {
        HandshakeReply::parse(run_command_sync(self, ADMIN_DATABASE, heartbeat_command())?)
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncHeartbeat for ConnectionCore {
    async fn heartbeat_async(&mut self) -> MdbResult<HandshakeReply> {
        HandshakeReply::parse(run_command_async(self, ADMIN_DATABASE, heartbeat_command()).await?)
    }
}

/// Creates the [`ConnectionCore`]s of one server.
#[derive(Debug, Clone)]
pub struct ConnectionCoreFactory {
    server_id: ServerId,
    params: ConnectParams,
    config: ConnectionConfiguration,
}
impl ConnectionCoreFactory {
    /// Constructor.
    pub fn new(server_id: ServerId, params: ConnectParams, config: ConnectionConfiguration) -> Self {
        Self {
            server_id,
            params,
            config,
        }
    }

    /// The server the connections go to.
    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }
}
impl ConnectionFactory for ConnectionCoreFactory {
    type Connection = ConnectionCore;

    fn create(&self) -> ConnectionCore {
        ConnectionCore::new(
            self.server_id.clone(),
            self.params.clone(),
            self.config.clone(),
        )
    }
}
