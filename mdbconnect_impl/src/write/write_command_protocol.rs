use super::{encode_message, WriteConcern, WriteRequest, WriteResult, WriteResultCombiner};
#[cfg(feature = "async")]
use crate::conn::AsyncWireConnection;
#[cfg(feature = "sync")]
use crate::conn::WireConnection;
use crate::{
    protocol::{MessageSettings, Namespace, WriteCommandMessage},
    MdbResult,
};
use std::time::Instant;

// An ordered batch must learn about the failure of a chunk before it sends the next one,
// even if the caller is not interested in the outcome.
pub(crate) fn needs_acknowledgement(
    write_concern: &WriteConcern,
    ordered: bool,
    has_continuation: bool,
) -> bool {
    write_concern.is_acknowledged() || (ordered && has_continuation)
}

// Executes a write as a chain of insert, update or delete commands.
#[derive(Debug)]
pub(crate) struct WriteCommandProtocol {
    namespace: Namespace,
    ordered: bool,
    write_concern: WriteConcern,
    requests: Vec<WriteRequest>,
}
impl WriteCommandProtocol {
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

    fn first_message(self, settings: MessageSettings) -> MdbResult<WriteCommandMessage> {
        WriteCommandMessage::try_new(
            self.namespace,
            self.ordered,
            self.write_concern,
            self.requests,
            settings,
        )
    }

    #[cfg(feature = "sync")]
    pub(crate) fn execute_sync(self, conn: &mut dyn WireConnection) -> MdbResult<WriteResult> {
        let start = Instant::now();
        let first = self.first_message(conn.message_settings())?;
        let mut state = ExecutionState::new(&first);
        let mut message = Some(first);
        while let Some(current) = message.take() {
            let (buffer, request_id, next) = encode_message(&current)?;
            conn.send_message_sync(buffer.as_slice(), request_id)?;
            if needs_acknowledgement(current.write_concern(), current.ordered(), next.is_some()) {
                let reply = conn
                    .receive_message_sync(request_id)?
                    .into_command_result()?;
                if !state.add_reply(&current, &reply)? {
                    break;
                }
            }
            message = next;
        }
        state.finish(start)
    }

    #[cfg(feature = "async")]
    pub(crate) async fn execute_async(
        self,
        conn: &mut dyn AsyncWireConnection,
    ) -> MdbResult<WriteResult> {
        let start = Instant::now();
        let first = self.first_message(conn.message_settings())?;
        let mut state = ExecutionState::new(&first);
        let mut message = Some(first);
        while let Some(current) = message.take() {
            let (buffer, request_id, next) = encode_message(&current)?;
            conn.send_message_async(buffer.as_slice(), request_id).await?;
            if needs_acknowledgement(current.write_concern(), current.ordered(), next.is_some()) {
                let reply = conn
                    .receive_message_async(request_id)
                    .await?
                    .into_command_result()?;
                if !state.add_reply(&current, &reply)? {
                    break;
                }
            }
            message = next;
        }
        state.finish(start)
    }
}

// What both flavours accumulate while walking the chain.
struct ExecutionState {
    combiner: WriteResultCombiner,
    acknowledged: bool,
    messages: usize,
}
impl ExecutionState {
    fn new(first: &WriteCommandMessage) -> Self {
        Self {
            combiner: WriteResultCombiner::new(first.kind()),
            acknowledged: first.write_concern().is_acknowledged(),
            messages: 0,
        }
    }

    // Returns false if the chain must stop here.
    fn add_reply(
        &mut self,
        message: &WriteCommandMessage,
        reply: &bson::Document,
    ) -> MdbResult<bool> {
        self.messages += 1;
        self.combiner.add_command_reply(reply, message.offset())?;
        if message.ordered() && self.combiner.has_write_errors() {
            debug!(
                "ordered {} stops after a failed chunk at request {}",
                message.kind().command_name(),
                message.offset()
            );
            Ok(false)
        } else {
            Ok(true)
        }
    }

    fn finish(self, start: Instant) -> MdbResult<WriteResult> {
        let kind = self.combiner.kind();
        trace!(
            "write with {} acknowledged message(s) took {} µs",
            self.messages,
            Instant::now().duration_since(start).as_micros()
        );
        let result = self.combiner.finish()?;
        if self.acknowledged {
            Ok(result)
        } else {
            Ok(WriteResult::unacknowledged(kind))
        }
    }
}

#[cfg(test)]
mod test {
    use super::{needs_acknowledgement, WriteCommandProtocol};
    use crate::{
        conn::{
            fake_wire_connection::FakeWireConnection, ClusterId, ConnectionDescription,
            ConnectionId, ServerAddress, ServerId, ServerVersion,
        },
        protocol::{decode_command, Namespace},
        write::{WriteConcern, WriteRequest},
        MdbError,
    };
    use bson::{doc, Document};

    // batches of at most two items
    fn connection(replies: Vec<Document>) -> FakeWireConnection {
        let server_id = ServerId::new(ClusterId::new(), ServerAddress::new("localhost", 27017));
        let description =
            ConnectionDescription::new(ConnectionId::new(server_id), ServerVersion::new(vec![3, 6]))
                .with_limits(2, 16 * 1024 * 1024, 48_000_000)
                .with_max_wire_version(6);
        FakeWireConnection::new(description, replies)
    }

    fn protocol(ordered: bool, write_concern: WriteConcern, count: i32) -> WriteCommandProtocol {
        WriteCommandProtocol::new(
            Namespace::new("test", "coll").unwrap(),
            ordered,
            write_concern,
            (0..count).map(|i| WriteRequest::insert(doc! {"_id": i})).collect(),
        )
    }

    fn sent_ids(conn: &FakeWireConnection) -> Vec<Vec<i32>> {
        conn.sent
            .iter()
            .map(|(bytes, _)| {
                decode_command(bytes)
                    .get_array("documents")
                    .unwrap()
                    .iter()
                    .map(|d| d.as_document().unwrap().get_i32("_id").unwrap())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_acknowledgement_rule() {
        let unack = WriteConcern::UNACKNOWLEDGED;
        assert!(needs_acknowledgement(&WriteConcern::ACKNOWLEDGED, false, false));
        assert!(needs_acknowledgement(&unack, true, true));
        assert!(!needs_acknowledgement(&unack, true, false));
        assert!(!needs_acknowledgement(&unack, false, true));
    }

    #[test]
    fn test_acknowledged_chain() {
        let mut conn = connection(vec![
            doc! {"ok": 1, "n": 2},
            doc! {"ok": 1, "n": 2},
            doc! {"ok": 1, "n": 1},
        ]);
        let result = protocol(true, WriteConcern::ACKNOWLEDGED, 5)
            .execute_sync(&mut conn)
            .unwrap();
        assert!(result.was_acknowledged());
        assert_eq!(result.count(), 5);
        assert_eq!(sent_ids(&conn), vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_ordered_chain_stops_after_failed_chunk() {
        let mut conn = connection(vec![
            doc! {"ok": 1, "n": 2},
            doc! {"ok": 1, "n": 1, "writeErrors": [{"index": 1, "code": 11000, "errmsg": "dup"}]},
            doc! {"ok": 1, "n": 1},
        ]);
        let err = protocol(true, WriteConcern::ACKNOWLEDGED, 5)
            .execute_sync(&mut conn)
            .unwrap_err();
        assert_eq!(conn.sent.len(), 2);
        match err {
            MdbError::WriteErrors { result, errors, .. } => {
                assert_eq!(result.count(), 3);
                assert_eq!(errors.len(), 1);
                // index 1 of the second chunk
                assert_eq!(errors[0].index(), 3);
                assert_eq!(errors[0].code(), 11000);
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn test_unordered_chain_continues_after_failed_chunk() {
        let mut conn = connection(vec![
            doc! {"ok": 1, "n": 1, "writeErrors": [{"index": 0, "code": 11000, "errmsg": "dup"}]},
            doc! {"ok": 1, "n": 2},
            doc! {"ok": 1, "n": 0, "writeErrors": [{"index": 0, "code": 11000, "errmsg": "dup"}]},
        ]);
        let err = protocol(false, WriteConcern::ACKNOWLEDGED, 5)
            .execute_sync(&mut conn)
            .unwrap_err();
        assert_eq!(conn.sent.len(), 3);
        match err {
            MdbError::WriteErrors { errors, .. } => {
                assert_eq!(
                    errors.iter().map(|e| e.index()).collect::<Vec<_>>(),
                    vec![0, 4]
                );
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn test_unacknowledged_ordered_chain_confirms_all_but_last() {
        let mut conn = connection(vec![doc! {"ok": 1, "n": 2}, doc! {"ok": 1, "n": 2}]);
        let result = protocol(true, WriteConcern::UNACKNOWLEDGED, 5)
            .execute_sync(&mut conn)
            .unwrap();
        assert!(!result.was_acknowledged());
        assert_eq!(conn.sent.len(), 3);
        assert_eq!(conn.received, 2);
    }

    #[test]
    fn test_unacknowledged_ordered_chain_stops_on_error() {
        let mut conn = connection(vec![
            doc! {"ok": 1, "n": 2},
            doc! {"ok": 1, "n": 0, "writeErrors": [{"index": 0, "code": 11000, "errmsg": "dup"}]},
        ]);
        assert!(protocol(true, WriteConcern::UNACKNOWLEDGED, 5)
            .execute_sync(&mut conn)
            .is_err());
        assert_eq!(conn.sent.len(), 2);
    }

    #[test]
    fn test_unacknowledged_unordered_chain_is_never_confirmed() {
        let mut conn = connection(vec![]);
        let result = protocol(false, WriteConcern::UNACKNOWLEDGED, 5)
            .execute_sync(&mut conn)
            .unwrap();
        assert!(!result.was_acknowledged());
        assert_eq!(conn.sent.len(), 3);
        assert_eq!(conn.received, 0);
    }

    #[test]
    fn test_write_concern_error_keeps_partial_result() {
        let mut conn = connection(vec![doc! {
            "ok": 1,
            "n": 1,
            "writeConcernError": {"code": 64, "errmsg": "waiting for replication timed out"},
        }]);
        let err = protocol(true, WriteConcern::MAJORITY, 1)
            .execute_sync(&mut conn)
            .unwrap_err();
        match err {
            MdbError::WriteConcern { result, error } => {
                assert_eq!(result.count(), 1);
                assert_eq!(error.code(), 64);
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn test_command_failure() {
        let mut conn = connection(vec![doc! {"ok": 0, "code": 13, "errmsg": "unauthorized"}]);
        let err = protocol(true, WriteConcern::ACKNOWLEDGED, 1)
            .execute_sync(&mut conn)
            .unwrap_err();
        assert_eq!(err.server_code(), Some(13));
    }

    #[tokio::test]
    async fn test_async_ordered_chain_stops_after_failed_chunk() {
        let mut conn = connection(vec![
            doc! {"ok": 1, "n": 2},
            doc! {"ok": 1, "n": 1, "writeErrors": [{"index": 1, "code": 11000, "errmsg": "dup"}]},
            doc! {"ok": 1, "n": 1},
        ]);
        let err = protocol(true, WriteConcern::ACKNOWLEDGED, 5)
            .execute_async(&mut conn)
            .await
            .unwrap_err();
        assert!(matches!(err, MdbError::WriteErrors { .. }));
        assert_eq!(conn.sent.len(), 2);
        assert_eq!(sent_ids(&conn), vec![vec![0, 1], vec![2, 3]]);
    }
}
