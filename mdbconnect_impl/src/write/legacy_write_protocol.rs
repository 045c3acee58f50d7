use super::{
    encode_message, needs_acknowledgement, WriteConcern, WriteRequest, WriteResult,
    WriteResultCombiner,
};
#[cfg(feature = "async")]
use crate::conn::AsyncWireConnection;
#[cfg(feature = "sync")]
use crate::conn::WireConnection;
use crate::{
    protocol::{
        BsonOutput, LegacyWriteMessage, MessageSettings, Namespace, QueryMessage, RequestMessage,
    },
    MdbResult,
};
use std::time::Instant;

// Executes a write with insert, update and delete messages, for servers that do not
// support write commands.
//
// The messages themselves have no reply. Where a confirmation is needed, a `getlasterror`
// command is appended to the same buffer, and its reply describes the preceding message.
#[derive(Debug)]
pub(crate) struct LegacyWriteProtocol {
    namespace: Namespace,
    ordered: bool,
    write_concern: WriteConcern,
    requests: Vec<WriteRequest>,
}

// One encoded message, possibly followed by its `getlasterror`.
struct Prepared {
    buffer: BsonOutput,
    last_request_id: i32,
    acknowledged: bool,
    next: Option<LegacyWriteMessage>,
}

impl LegacyWriteProtocol {
    pub(crate) fn new(
        namespace: Namespace,
        ordered: bool,
        write_concern: WriteConcern,
        requests: Vec<WriteRequest>,
    ) -> Self {
        Self {
            namespace,
            ordered,
            write_concern,
            requests,
        }
    }

    fn first_message(&mut self, settings: MessageSettings) -> MdbResult<LegacyWriteMessage> {
        LegacyWriteMessage::try_new(
            self.namespace.clone(),
            self.ordered,
            std::mem::take(&mut self.requests),
            settings,
        )
    }

    fn prepare(&self, message: &LegacyWriteMessage, settings: MessageSettings) -> MdbResult<Prepared> {
        let (mut buffer, request_id, next) = encode_message(message)?;
        if needs_acknowledgement(&self.write_concern, self.ordered, next.is_some()) {
            let command = if self.write_concern.is_acknowledged() {
                self.write_concern.get_last_error_command()
            } else {
                WriteConcern::ACKNOWLEDGED.get_last_error_command()
            };
            let last_error = QueryMessage::command(self.namespace.database(), command, settings)?;
            let last_request_id = last_error.encode(&mut buffer)?.request_id();
            Ok(Prepared {
                buffer,
                last_request_id,
                acknowledged: true,
                next,
            })
        } else {
            Ok(Prepared {
                buffer,
                last_request_id: request_id,
                acknowledged: false,
                next,
            })
        }
    }

    // Returns false if the chain must stop here.
    fn add_reply(
        &self,
        combiner: &mut WriteResultCombiner,
        message: &LegacyWriteMessage,
        next: Option<&LegacyWriteMessage>,
        reply: &bson::Document,
    ) -> bool {
        let item_count = next.map_or(message.remaining_requests().len(), |n| {
            n.offset() - message.offset()
        });
        combiner.add_last_error(reply, message.offset(), item_count);
        if self.ordered && combiner.has_write_errors() {
            debug!(
                "ordered legacy {} on {} stops at request {}",
                message.kind().command_name(),
                message.namespace(),
                message.offset()
            );
            false
        } else {
            true
        }
    }

    fn finish(&self, combiner: WriteResultCombiner, start: Instant) -> MdbResult<WriteResult> {
        let kind = combiner.kind();
        trace!(
            "legacy write took {} µs",
            Instant::now().duration_since(start).as_micros()
        );
        let result = combiner.finish()?;
        if self.write_concern.is_acknowledged() {
            Ok(result)
        } else {
            Ok(WriteResult::unacknowledged(kind))
        }
    }

    #[cfg(feature = "sync")]
    pub(crate) fn execute_sync(mut self, conn: &mut dyn WireConnection) -> MdbResult<WriteResult> {
        let start = Instant::now();
        let settings = conn.message_settings();
        let first = self.first_message(settings)?;
        let mut combiner = WriteResultCombiner::new(first.kind());
        let mut message = Some(first);
        while let Some(current) = message.take() {
            let prepared = self.prepare(&current, settings)?;
            conn.send_message_sync(prepared.buffer.as_slice(), prepared.last_request_id)?;
            if prepared.acknowledged {
                let reply = conn
                    .receive_message_sync(prepared.last_request_id)?
                    .into_command_result()?;
                if !self.add_reply(&mut combiner, &current, prepared.next.as_ref(), &reply) {
                    break;
                }
            }
            message = prepared.next;
        }
        self.finish(combiner, start)
    }

    #[cfg(feature = "async")]
    pub(crate) async fn execute_async(
        mut self,
        conn: &mut dyn AsyncWireConnection,
    ) -> MdbResult<WriteResult> {
        let start = Instant::now();
        let settings = conn.message_settings();
        let first = self.first_message(settings)?;
        let mut combiner = WriteResultCombiner::new(first.kind());
        let mut message = Some(first);
        while let Some(current) = message.take() {
            let prepared = self.prepare(&current, settings)?;
            conn.send_message_async(prepared.buffer.as_slice(), prepared.last_request_id)
                .await?;
            if prepared.acknowledged {
                let reply = conn
                    .receive_message_async(prepared.last_request_id)
                    .await?
                    .into_command_result()?;
                if !self.add_reply(&mut combiner, &current, prepared.next.as_ref(), &reply) {
                    break;
                }
            }
            message = prepared.next;
        }
        self.finish(combiner, start)
    }
}

#[cfg(test)]
mod test {
    use super::LegacyWriteProtocol;
    use crate::{
        conn::{
            fake_wire_connection::FakeWireConnection, ClusterId, ConnectionDescription,
            ConnectionId, ServerAddress, ServerId, ServerVersion,
        },
        protocol::{Namespace, OpCode},
        write::{WriteConcern, WriteRequest},
        MdbError,
    };
    use bson::{doc, Bson, Document};
    use byteorder::{LittleEndian, ReadBytesExt};
    use std::io::Cursor;

    fn connection(replies: Vec<Document>) -> FakeWireConnection {
        let server_id = ServerId::new(ClusterId::new(), ServerAddress::new("localhost", 27017));
        let description =
            ConnectionDescription::new(ConnectionId::new(server_id), ServerVersion::new(vec![2, 4]))
                .with_limits(2, 16 * 1024 * 1024, 48_000_000);
        FakeWireConnection::new(description, replies)
    }

    fn protocol(ordered: bool, write_concern: WriteConcern, requests: Vec<WriteRequest>) -> LegacyWriteProtocol {
        LegacyWriteProtocol::new(
            Namespace::new("test", "coll").unwrap(),
            ordered,
            write_concern,
            requests,
        )
    }

    fn inserts(count: i32) -> Vec<WriteRequest> {
        (0..count).map(|i| WriteRequest::insert(doc! {"_id": i})).collect()
    }

    // The opcodes of the messages in one sent buffer.
    fn opcodes(buffer: &[u8]) -> Vec<i32> {
        let mut result = Vec::new();
        let mut pos = 0;
        while pos < buffer.len() {
            let mut rdr = Cursor::new(&buffer[pos..]);
            let length = rdr.read_i32::<LittleEndian>().unwrap();
            rdr.set_position(12);
            result.push(rdr.read_i32::<LittleEndian>().unwrap());
            pos += usize::try_from(length).unwrap();
        }
        result
    }

    fn last_error(n: i32) -> Document {
        doc! {"ok": 1, "err": Bson::Null, "n": n}
    }

    #[test]
    fn test_acknowledged_inserts() {
        let mut conn = connection(vec![last_error(0), last_error(0), last_error(0)]);
        let result = protocol(true, WriteConcern::ACKNOWLEDGED, inserts(5))
            .execute_sync(&mut conn)
            .unwrap();
        assert_eq!(result.count(), 5);
        assert_eq!(result.modified_count(), None);
        assert_eq!(conn.sent.len(), 3);
        for (buffer, _) in &conn.sent {
            assert_eq!(
                opcodes(buffer),
                vec![OpCode::Insert.to_i32(), OpCode::Query.to_i32()]
            );
        }
    }

    #[test]
    fn test_upsert() {
        let mut conn = connection(vec![doc! {
            "ok": 1, "err": Bson::Null, "n": 1, "updatedExisting": false, "upserted": 42
        }]);
        let result = protocol(
            true,
            WriteConcern::ACKNOWLEDGED,
            vec![WriteRequest::upsert_one(doc! {"a": 1}, doc! {"a": 2})],
        )
        .execute_sync(&mut conn)
        .unwrap();
        assert_eq!(result.count(), 1);
        assert_eq!(result.matched_count(), 0);
        assert_eq!(result.upserts()[0].id(), &Bson::Int32(42));
    }

    #[test]
    fn test_ordered_stops_on_error() {
        let mut conn = connection(vec![
            last_error(0),
            doc! {"ok": 1, "err": "E11000 duplicate key", "code": 11000, "n": 0},
            last_error(0),
        ]);
        let err = protocol(true, WriteConcern::ACKNOWLEDGED, inserts(5))
            .execute_sync(&mut conn)
            .unwrap_err();
        assert_eq!(conn.sent.len(), 2);
        match err {
            MdbError::WriteErrors { result, errors, .. } => {
                assert_eq!(result.count(), 2);
                assert_eq!(errors[0].index(), 2);
                assert_eq!(errors[0].code(), 11000);
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn test_write_concern_timeout() {
        let mut conn = connection(vec![doc! {
            "ok": 1, "err": "timeout", "code": 64, "wtimeout": true, "n": 3
        }]);
        let err = protocol(
            true,
            WriteConcern::MAJORITY,
            vec![WriteRequest::delete_many(doc! {"a": 1})],
        )
        .execute_sync(&mut conn)
        .unwrap_err();
        match err {
            MdbError::WriteConcern { result, error } => {
                assert_eq!(result.count(), 3);
                assert_eq!(error.code(), 64);
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn test_unacknowledged_unordered() {
        let mut conn = connection(vec![]);
        let result = protocol(false, WriteConcern::UNACKNOWLEDGED, inserts(5))
            .execute_sync(&mut conn)
            .unwrap();
        assert!(!result.was_acknowledged());
        assert_eq!(conn.received, 0);
        for (buffer, _) in &conn.sent {
            assert_eq!(opcodes(buffer), vec![OpCode::Insert.to_i32()]);
        }
    }

    #[tokio::test]
    async fn test_async_updates_one_per_message() {
        let mut conn = connection(vec![last_error(1), last_error(1)]);
        let result = protocol(
            false,
            WriteConcern::ACKNOWLEDGED,
            vec![
                WriteRequest::update_one(doc! {"a": 1}, doc! {"$set": {"b": 1}}),
                WriteRequest::update_many(doc! {"a": 2}, doc! {"$set": {"b": 2}}),
            ],
        )
        .execute_async(&mut conn)
        .await
        .unwrap();
        assert_eq!(result.count(), 2);
        assert_eq!(result.matched_count(), 2);
        assert_eq!(conn.sent.len(), 2);
        assert_eq!(
            opcodes(&conn.sent[0].0),
            vec![OpCode::Update.to_i32(), OpCode::Query.to_i32()]
        );
    }
}
