use crate::{
    protocol::{
        request::{check_hard_ceiling, next_request_id, RequestMessage, HEADROOM},
        BsonOutput, MessageSettings, Namespace, OpCode,
    },
    write::{WriteConcern, WriteKind, WriteRequest},
    MdbResult,
};
use std::sync::Arc;

// An insert, update or delete command for a batch of write requests.
//
// The requests are shared with all continuation messages; each message knows the offset
// of its first request. Encoding stops at the first request that would violate a limit,
// and the continuation starts with exactly that request.
#[derive(Debug, Clone)]
pub(crate) struct WriteCommandMessage {
    request_id: i32,
    namespace: Namespace,
    kind: WriteKind,
    ordered: bool,
    write_concern: WriteConcern,
    requests: Arc<[WriteRequest]>,
    offset: usize,
    settings: MessageSettings,
}
impl WriteCommandMessage {
    pub(crate) fn try_new(
        namespace: Namespace,
        ordered: bool,
        write_concern: WriteConcern,
        requests: Vec<WriteRequest>,
        settings: MessageSettings,
    ) -> MdbResult<Self> {
        let kind = requests
            .first()
            .map(WriteRequest::kind)
            .ok_or_else(|| usage_err!("a write needs at least one request"))?;
        if requests.iter().any(|r| r.kind() != kind) {
            return Err(usage_err!(
                "all requests of a write command must be of kind {kind:?}"
            ));
        }
        Ok(Self {
            request_id: next_request_id(),
            namespace,
            kind,
            ordered,
            write_concern,
            requests: Arc::from(requests),
            offset: 0,
            settings,
        })
    }

    fn continuation(&self, offset: usize) -> Self {
        Self {
            request_id: next_request_id(),
            offset,
            requests: Arc::clone(&self.requests),
            namespace: self.namespace.clone(),
            write_concern: self.write_concern.clone(),
            ..*self
        }
    }

    pub(crate) fn kind(&self) -> WriteKind {
        self.kind
    }
    pub(crate) fn ordered(&self) -> bool {
        self.ordered
    }
    pub(crate) fn write_concern(&self) -> &WriteConcern {
        &self.write_concern
    }
    // Index of this message's first request within the complete request list.
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }
    // The requests this message and its continuations carry.
    pub(crate) fn remaining_requests(&self) -> &[WriteRequest] {
        &self.requests[self.offset..]
    }

    fn exceeds_limits(&self, batch_length: usize, item_count: usize) -> bool {
        self.exceeds_batch_length_limit(batch_length, item_count)
            || item_count > self.settings.max_batch_count()
    }

    // A single document is always let through.
    fn exceeds_batch_length_limit(&self, batch_length: usize, item_count: usize) -> bool {
        batch_length > self.settings.max_document_size() + HEADROOM && item_count > 1
    }
}

impl RequestMessage for WriteCommandMessage {
    fn request_id(&self) -> i32 {
        self.request_id
    }
    fn op_code(&self) -> OpCode {
        OpCode::Query
    }
    fn encode_body(&self, out: &mut BsonOutput, message_start: usize) -> MdbResult<Option<Self>> {
        out.write_i32(0)?; // I4 flags
        out.write_cstring(&format!("{}.$cmd", self.namespace.database()))?;
        out.write_i32(0)?; // I4 number to skip
        out.write_i32(-1)?; // I4 number to return

        let command_start = out.start_document()?;
        out.write_string_element(self.kind.command_name(), self.namespace.collection())?;
        out.write_bool_element("ordered", self.ordered)?;
        if !self.write_concern.is_server_default() {
            out.write_document_element("writeConcern", &self.write_concern.to_document())?;
        }

        let items_start = out.start_array(self.kind.items_field())?;
        let mut next = None;
        for (i, request) in self.remaining_requests().iter().enumerate() {
            let mark = out.position();
            out.write_document_element(&i.to_string(), &request.to_command_item())?;
            if i == 0 {
                // plus the terminators of the array and the command
                check_hard_ceiling(out.position() + 2 - message_start, &self.settings)?;
            }
            if self.exceeds_limits(out.position() - command_start, i + 1) {
                out.truncate(mark);
                next = Some(self.continuation(self.offset + i));
                break;
            }
        }
        out.end_array(items_start)?;
        out.end_document(command_start)?;

        if let Some(ref next) = next {
            debug!(
                "{} command for {} split after {} of {} items",
                self.kind.command_name(),
                self.namespace,
                next.offset - self.offset,
                self.remaining_requests().len()
            );
        }
        Ok(next)
    }
}
