use crate::{
    protocol::{BsonOutput, MessageSettings, OpCode},
    MdbError, MdbResult,
};
use std::sync::atomic::{AtomicI32, Ordering};

pub(crate) const MESSAGE_HEADER_LENGTH: usize = 16;

// Extra room a command envelope may take beyond the document size limit.
pub(crate) const HEADROOM: usize = 16 * 1024;

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

// All request ids of the process come from this counter, so that the response-to field
// of a reply identifies the request unambiguously.
pub(crate) fn next_request_id() -> i32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// What the encoding of a message produced.
#[derive(Debug)]
pub(crate) struct EncodingMetadata<M> {
    request_id: i32,
    next: Option<M>,
}
impl<M> EncodingMetadata<M> {
    pub(crate) fn request_id(&self) -> i32 {
        self.request_id
    }
    // The message that carries the items that did not fit into this one.
    pub(crate) fn into_next(self) -> Option<M> {
        self.next
    }
}

/// A request message.
///
/// Encoding writes the 16 byte header with a length placeholder, the opcode-specific body,
/// and then backpatches the real length.
pub(crate) trait RequestMessage: Sized {
    /// The unique id of this message.
    fn request_id(&self) -> i32;

    /// The opcode of this message.
    fn op_code(&self) -> OpCode;

    /// Writes everything after the header; returns the continuation if not all items fit.
    fn encode_body(&self, out: &mut BsonOutput, message_start: usize) -> MdbResult<Option<Self>>;

    /// Appends this message to the output buffer.
    ///
    /// # Errors
    ///
    /// `MdbError::SizeLimit` if a document can never be sent; serialization errors.
    fn encode(&self, out: &mut BsonOutput) -> MdbResult<EncodingMetadata<Self>> {
        let message_start = out.position();
        out.write_i32(0)?; // I4 message length, backpatched
        out.write_i32(self.request_id())?; // I4
        out.write_i32(0)?; // I4 response to
        out.write_i32(self.op_code().to_i32())?; // I4
        let next = self.encode_body(out, message_start)?;
        out.backpatch_length(message_start)?;
        trace!(
            "encoded {:?} message {} with {} bytes",
            self.op_code(),
            self.request_id(),
            out.position() - message_start
        );
        Ok(EncodingMetadata {
            request_id: self.request_id(),
            next,
        })
    }
}

// Rejects a message that carries a single item and is still too long for the server.
pub(crate) fn check_hard_ceiling(message_length: usize, settings: &MessageSettings) -> MdbResult<()> {
    let limit = settings.max_message_size();
    if message_length > limit {
        Err(MdbError::SizeLimit {
            what: "message",
            actual: message_length,
            limit,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::check_hard_ceiling;
    use crate::{protocol::MessageSettings, MdbError};

    #[test]
    fn test_hard_ceiling_counts_whole_message() {
        let settings = MessageSettings::try_new(1024, 1000, 10).unwrap();
        assert!(check_hard_ceiling(1000, &settings).is_ok());
        match check_hard_ceiling(1001, &settings) {
            Err(MdbError::SizeLimit { actual, limit, .. }) => {
                assert_eq!((actual, limit), (1001, 1000));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
