use crate::{
    protocol::{
        request::{check_hard_ceiling, next_request_id, RequestMessage},
        BsonOutput, MessageSettings, Namespace, OpCode,
    },
    write::{WriteKind, WriteRequest},
    MdbError, MdbResult,
};
use std::sync::Arc;

const CONTINUE_ON_ERROR: i32 = 1;
const UPSERT: i32 = 1;
const MULTI_UPDATE: i32 = 1 << 1;
const SINGLE_REMOVE: i32 = 1;

// A write without command support.
//
// An insert message carries as many documents as the message size and batch count allow.
// Update and delete messages carry exactly one request. The remainder goes into a
// continuation in both cases.
#[derive(Debug, Clone)]
pub(crate) struct LegacyWriteMessage {
    request_id: i32,
    namespace: Namespace,
    kind: WriteKind,
    continue_on_error: bool,
    requests: Arc<[WriteRequest]>,
    offset: usize,
    settings: MessageSettings,
}
impl LegacyWriteMessage {
    pub(crate) fn try_new(
        namespace: Namespace,
        ordered: bool,
        requests: Vec<WriteRequest>,
        settings: MessageSettings,
    ) -> MdbResult<Self> {
        let kind = requests
            .first()
            .map(WriteRequest::kind)
            .ok_or_else(|| usage_err!("a write needs at least one request"))?;
        if requests.iter().any(|r| r.kind() != kind) {
            return Err(usage_err!("all requests of a write must be of kind {kind:?}"));
        }
        Ok(Self {
            request_id: next_request_id(),
            namespace,
            kind,
            continue_on_error: !ordered,
            requests: Arc::from(requests),
            offset: 0,
            settings,
        })
    }

    fn continuation(&self, offset: usize) -> Self {
        Self {
            request_id: next_request_id(),
            namespace: self.namespace.clone(),
            requests: Arc::clone(&self.requests),
            offset,
            ..*self
        }
    }

    pub(crate) fn kind(&self) -> WriteKind {
        self.kind
    }
    pub(crate) fn namespace(&self) -> &Namespace {
        &self.namespace
    }
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }
    pub(crate) fn remaining_requests(&self) -> &[WriteRequest] {
        &self.requests[self.offset..]
    }

    fn check_document_size(&self, size: usize) -> MdbResult<()> {
        if size > self.settings.max_document_size() {
            Err(MdbError::SizeLimit {
                what: "document",
                actual: size,
                limit: self.settings.max_document_size(),
            })
        } else {
            Ok(())
        }
    }

    fn encode_inserts(&self, out: &mut BsonOutput, message_start: usize) -> MdbResult<Option<Self>> {
        out.write_i32(if self.continue_on_error {
            CONTINUE_ON_ERROR
        } else {
            0
        })?; // I4 flags
        out.write_cstring(&self.namespace.full_name())?;
        let mut next = None;
        for (i, request) in self.remaining_requests().iter().enumerate() {
            let WriteRequest::Insert { document } = request else {
                return Err(impl_err!("non-insert request in insert message"));
            };
            let mark = out.position();
            let size = out.write_document(document)?;
            self.check_document_size(size)?;
            let item_count = i + 1;
            if item_count == 1 {
                check_hard_ceiling(out.position() - message_start, &self.settings)?;
            }
            let too_long =
                out.position() - message_start > self.settings.max_message_size() && item_count > 1;
            if too_long || item_count > self.settings.max_batch_count() {
                out.truncate(mark);
                next = Some(self.continuation(self.offset + i));
                break;
            }
        }
        Ok(next)
    }

    fn next_single(&self) -> Option<Self> {
        (self.offset + 1 < self.requests.len()).then(|| self.continuation(self.offset + 1))
    }
}

impl RequestMessage for LegacyWriteMessage {
    fn request_id(&self) -> i32 {
        self.request_id
    }
    fn op_code(&self) -> OpCode {
        match self.kind {
            WriteKind::Insert => OpCode::Insert,
            WriteKind::Update => OpCode::Update,
            WriteKind::Delete => OpCode::Delete,
        }
    }
    fn encode_body(&self, out: &mut BsonOutput, message_start: usize) -> MdbResult<Option<Self>> {
        match &self.requests[self.offset] {
            WriteRequest::Insert { .. } => self.encode_inserts(out, message_start),
            WriteRequest::Update {
                filter,
                update,
                upsert,
                multi,
            } => {
                out.write_i32(0)?; // I4 reserved
                out.write_cstring(&self.namespace.full_name())?;
                let mut flags = 0;
                if *upsert {
                    flags |= UPSERT;
                }
                if *multi {
                    flags |= MULTI_UPDATE;
                }
                out.write_i32(flags)?; // I4
                let size = out.write_document(filter)?;
                self.check_document_size(size)?;
                let size = out.write_document(update)?;
                self.check_document_size(size)?;
                check_hard_ceiling(out.position() - message_start, &self.settings)?;
                Ok(self.next_single())
            }
            WriteRequest::Delete { filter, multi } => {
                out.write_i32(0)?; // I4 reserved
                out.write_cstring(&self.namespace.full_name())?;
                out.write_i32(if *multi { 0 } else { SINGLE_REMOVE })?; // I4 flags
                let size = out.write_document(filter)?;
                self.check_document_size(size)?;
                check_hard_ceiling(out.position() - message_start, &self.settings)?;
                Ok(self.next_single())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::LegacyWriteMessage;
    use crate::{
        protocol::{request::RequestMessage, BsonOutput, MessageSettings, Namespace, OpCode},
        write::WriteRequest,
        MdbError,
    };
    use bson::doc;
    use byteorder::{LittleEndian, ReadBytesExt};
    use std::io::Cursor;

    fn opcode_of(bytes: &[u8]) -> i32 {
        Cursor::new(&bytes[12..16]).read_i32::<LittleEndian>().unwrap()
    }

    #[test]
    fn test_insert_split_by_message_size() {
        let settings = MessageSettings::try_new(10_000, 2_500, 1000).unwrap();
        let requests: Vec<WriteRequest> = (0..5)
            .map(|i| WriteRequest::insert(doc! {"i": i, "pad": "p".repeat(1000)}))
            .collect();
        let mut msg =
            LegacyWriteMessage::try_new(Namespace::new("d", "c").unwrap(), true, requests, settings)
                .unwrap();
        let mut offsets = vec![msg.offset()];
        loop {
            let mut out = BsonOutput::new();
            let metadata = msg.encode(&mut out).unwrap();
            assert_eq!(opcode_of(out.as_slice()), OpCode::Insert.to_i32());
            assert!(out.position() <= 2_500);
            match metadata.into_next() {
                Some(next) => {
                    offsets.push(next.offset());
                    msg = next;
                }
                None => break,
            }
        }
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[test]
    fn test_updates_go_one_per_message() {
        let requests = vec![
            WriteRequest::update_one(doc! {"a": 1}, doc! {"$set": {"b": 1}}),
            WriteRequest::update_many(doc! {"a": 2}, doc! {"$set": {"b": 2}}),
        ];
        let msg = LegacyWriteMessage::try_new(
            Namespace::new("d", "c").unwrap(),
            true,
            requests,
            MessageSettings::default(),
        )
        .unwrap();
        let mut out = BsonOutput::new();
        let next = msg.encode(&mut out).unwrap().into_next().unwrap();
        assert_eq!(opcode_of(out.as_slice()), OpCode::Update.to_i32());
        assert_eq!(next.offset(), 1);
        let mut out = BsonOutput::new();
        assert!(next.encode(&mut out).unwrap().into_next().is_none());
    }

    #[test]
    fn test_single_insert_beyond_message_size_is_rejected() {
        // the document is within the document limit, the whole message is not
        let settings = MessageSettings::try_new(10_000, 1_000, 1000).unwrap();
        let msg = LegacyWriteMessage::try_new(
            Namespace::new("d", "c").unwrap(),
            true,
            vec![WriteRequest::insert(doc! {"pad": "p".repeat(980)})],
            settings,
        )
        .unwrap();
        match msg.encode(&mut BsonOutput::new()) {
            Err(MdbError::SizeLimit { what, limit, .. }) => {
                assert_eq!(what, "message");
                assert_eq!(limit, 1_000);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_oversized_legacy_document_is_rejected() {
        let settings = MessageSettings::try_new(100, 10_000, 1000).unwrap();
        let msg = LegacyWriteMessage::try_new(
            Namespace::new("d", "c").unwrap(),
            true,
            vec![WriteRequest::delete_one(doc! {"pad": "p".repeat(200)})],
            settings,
        )
        .unwrap();
        assert!(msg.encode(&mut BsonOutput::new()).is_err());
    }
}
