//! Write execution, with write commands or with legacy write messages.

mod legacy_write_protocol;
mod write_command_protocol;
mod write_concern;
mod write_request;
mod write_result;

pub(crate) use self::{
    legacy_write_protocol::LegacyWriteProtocol,
    write_command_protocol::{needs_acknowledgement, WriteCommandProtocol},
};
pub(crate) use self::write_result::WriteResultCombiner;
pub use self::{
    write_concern::{Acknowledgment, WriteConcern},
    write_request::{WriteKind, WriteRequest},
    write_result::{Upsert, WriteConcernError, WriteError, WriteResult},
};

use crate::{
    conn::ConnectionDescription,
    protocol::{BsonOutput, RequestMessage},
    MdbResult,
};

// A command is always answered, so unacknowledged writes use the legacy messages.
pub(crate) fn uses_write_commands(
    description: Option<&ConnectionDescription>,
    write_concern: &WriteConcern,
) -> bool {
    write_concern.is_acknowledged()
        && description.is_some_and(ConnectionDescription::supports_write_commands)
}

// Encodes a message into a fresh buffer; returns the buffer, the message's id and
// the continuation.
pub(crate) fn encode_message<M: RequestMessage>(
    message: &M,
) -> MdbResult<(BsonOutput, i32, Option<M>)> {
    let mut out = BsonOutput::new();
    let metadata = message.encode(&mut out)?;
    let request_id = metadata.request_id();
    Ok((out, request_id, metadata.into_next()))
}
