use crate::{
    conn::ConnectionDescription,
    protocol::{BsonOutput, MessageSettings, QueryMessage, Reply, RequestMessage},
    MdbResult,
};
#[cfg(feature = "async")]
use async_trait::async_trait;
use bson::Document;
use std::time::Instant;

/// What every connection knows about itself.
pub trait ConnectionInfo {
    /// The description that was produced by the handshake, if it was done already.
    fn description(&self) -> Option<&ConnectionDescription>;

    /// The limits message encoders have to honor on this connection.
    fn message_settings(&self) -> MessageSettings {
        self.description()
            .map_or_else(MessageSettings::default, MessageSettings::from)
    }
}

/// A connection that can send and receive wire messages, blocking.
///
/// Messages and their replies are strictly ordered on a connection.
#[cfg(feature = "sync")]
pub trait WireConnection: ConnectionInfo + Send {
    /// Sends one or more encoded messages.
    ///
    /// # Errors
    ///
    /// Transport errors; they leave the connection broken.
    fn send_message_sync(&mut self, message: &[u8], last_request_id: i32) -> MdbResult<()>;

    /// Receives the reply to the given request.
    ///
    /// # Errors
    ///
    /// Transport errors; `MdbError::Protocol` if the reply does not match the request.
    fn receive_message_sync(&mut self, response_to: i32) -> MdbResult<Reply>;
}

/// A connection that can send and receive wire messages, non-blocking.
#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncWireConnection: ConnectionInfo + Send {
    /// Sends one or more encoded messages.
    ///
    /// # Errors
    ///
    /// Transport errors; they leave the connection broken.
    async fn send_message_async(&mut self, message: &[u8], last_request_id: i32) -> MdbResult<()>;

    /// Receives the reply to the given request.
    ///
    /// # Errors
    ///
    /// Transport errors; `MdbError::Protocol` if the reply does not match the request.
    async fn receive_message_async(&mut self, response_to: i32) -> MdbResult<Reply>;
}

/// Sends a command to the given database and returns the checked result document.
///
/// # Errors
///
/// Transport errors, and `MdbError::Command` if the server answers with `ok: 0`.
#[cfg(feature = "sync")]
pub fn run_command_sync<C: WireConnection + ?Sized>(
    conn: &mut C,
    database: &str,
    command: Document,
) -> MdbResult<Document> {
    let start = Instant::now();
    let message = QueryMessage::command(database, command, conn.message_settings())?;
    let reply = roundtrip_sync(conn, &message)?;
    let result = reply.into_command_result();
    trace!(
        "command roundtrip took {} µs",
        Instant::now().duration_since(start).as_micros()
    );
    result
}

/// Sends a command to the given database and returns the checked result document.
///
/// # Errors
///
/// Transport errors, and `MdbError::Command` if the server answers with `ok: 0`.
#[cfg(feature = "async")]
pub async fn run_command_async<C: AsyncWireConnection + ?Sized>(
    conn: &mut C,
    database: &str,
    command: Document,
) -> MdbResult<Document> {
    let start = Instant::now();
    let message = QueryMessage::command(database, command, conn.message_settings())?;
    let reply = roundtrip_async(conn, &message).await?;
    let result = reply.into_command_result();
    trace!(
        "command roundtrip took {} µs",
        Instant::now().duration_since(start).as_micros()
    );
    result
}

// Sends a message that does not split, and receives its reply.
#[cfg(feature = "sync")]
pub(crate) fn roundtrip_sync<C, M>(conn: &mut C, message: &M) -> MdbResult<Reply>
where
    C: WireConnection + ?Sized,
    M: RequestMessage,
{
    let mut out = BsonOutput::new();
    let request_id = message.encode(&mut out)?.request_id();
    conn.send_message_sync(out.as_slice(), request_id)?;
    conn.receive_message_sync(request_id)
}

#[cfg(feature = "async")]
pub(crate) async fn roundtrip_async<C, M>(conn: &mut C, message: &M) -> MdbResult<Reply>
where
    C: AsyncWireConnection + ?Sized,
    M: RequestMessage + Sync,
{
    let mut out = BsonOutput::new();
    let request_id = message.encode(&mut out)?.request_id();
    conn.send_message_async(out.as_slice(), request_id).await?;
    conn.receive_message_async(request_id).await
}
