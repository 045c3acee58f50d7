use crate::{
    conn::{
        roundtrip_sync, run_command_sync, ConnectionCore, ConnectionCoreFactory,
        ConnectionDescription, ConnectionInfo, ConnectionStatistics, WireConnection,
    },
    pool::PooledConnection,
    protocol::{GetMoreMessage, KillCursorsMessage, Namespace, QueryMessage, QueryOptions, Reply},
    write::{
        encode_message, uses_write_commands, LegacyWriteProtocol, WriteCommandProtocol,
        WriteConcern, WriteKind, WriteRequest, WriteResult,
    },
    MdbResult,
};
use bson::Document;

/// A connection to a server, taken from the server's pool.
///
/// Dropping the connection returns it to the pool.
#[derive(Debug)]
pub struct Connection {
    pooled: PooledConnection<ConnectionCoreFactory>,
}

impl Connection {
    pub(crate) fn new(pooled: PooledConnection<ConnectionCoreFactory>) -> Self {
        Self { pooled }
    }

    /// What the handshake revealed about the server.
    pub fn description(&self) -> Option<&ConnectionDescription> {
        self.pooled.description()
    }

    /// Traffic counters of the underlying physical connection.
    pub fn statistics(&self) -> Option<&ConnectionStatistics> {
        self.pooled.connection().map(ConnectionCore::statistics)
    }

    /// Resets the traffic counters.
    pub fn reset_statistics(&mut self) {
        if let Some(core) = self.pooled.connection_mut() {
            core.reset_statistics();
        }
    }

    /// Runs a command against the given database and returns its result document.
    ///
    /// # Errors
    ///
    /// `MdbError::Command` if the server answers with `ok: 0`, and transport errors.
    pub fn command(&mut self, database: &str, command: Document) -> MdbResult<Document> {
        run_command_sync(&mut self.pooled, database, command)
    }

    /// Runs a query and returns the first batch; use the reply's cursor id to fetch more.
    ///
    /// # Errors
    ///
    /// `MdbError::Command` if the server reports a query failure, and transport errors.
    pub fn query(
        &mut self,
        namespace: &Namespace,
        filter: Document,
        options: QueryOptions,
    ) -> MdbResult<Reply> {
        let message = QueryMessage::new(namespace.clone(), filter, self.pooled.message_settings())
            .with_options(options);
        roundtrip_sync(&mut self.pooled, &message)?.into_query_result()
    }

    /// Fetches the next batch of a cursor.
    ///
    /// # Errors
    ///
    /// `MdbError::Command` if the cursor is unknown to the server, and transport errors.
    pub fn get_more(
        &mut self,
        namespace: &Namespace,
        cursor_id: i64,
        number_to_return: i32,
    ) -> MdbResult<Reply> {
        let message = GetMoreMessage::new(namespace.clone(), cursor_id, number_to_return);
        roundtrip_sync(&mut self.pooled, &message)?.into_query_result()
    }

    /// Closes cursors on the server; the server does not answer.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` for an empty list, and transport errors.
    pub fn kill_cursors(&mut self, cursor_ids: Vec<i64>) -> MdbResult<()> {
        let message = KillCursorsMessage::try_new(cursor_ids)?;
        let (out, request_id, _) = encode_message(&message)?;
        self.pooled.send_message_sync(out.as_slice(), request_id)
    }

    /// Inserts documents.
    ///
    /// # Errors
    ///
    /// `MdbError::WriteErrors` or `MdbError::WriteConcern` with the partial result,
    /// `MdbError::SizeLimit` for a document the server cannot take, and transport errors.
    pub fn insert(
        &mut self,
        namespace: &Namespace,
        documents: Vec<Document>,
        ordered: bool,
        write_concern: WriteConcern,
    ) -> MdbResult<WriteResult> {
        let requests = documents.into_iter().map(WriteRequest::insert).collect();
        self.write(namespace, WriteKind::Insert, requests, ordered, write_concern)
    }

    /// Executes update requests.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if a request is not an update; otherwise like
    /// [`Connection::insert`].
    pub fn update(
        &mut self,
        namespace: &Namespace,
        requests: Vec<WriteRequest>,
        ordered: bool,
        write_concern: WriteConcern,
    ) -> MdbResult<WriteResult> {
        self.write(namespace, WriteKind::Update, requests, ordered, write_concern)
    }

    /// Executes delete requests.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if a request is not a delete; otherwise like
    /// [`Connection::insert`].
    pub fn delete(
        &mut self,
        namespace: &Namespace,
        requests: Vec<WriteRequest>,
        ordered: bool,
        write_concern: WriteConcern,
    ) -> MdbResult<WriteResult> {
        self.write(namespace, WriteKind::Delete, requests, ordered, write_concern)
    }

    fn write(
        &mut self,
        namespace: &Namespace,
        kind: WriteKind,
        requests: Vec<WriteRequest>,
        ordered: bool,
        write_concern: WriteConcern,
    ) -> MdbResult<WriteResult> {
        if let Some(request) = requests.iter().find(|r| r.kind() != kind) {
            return Err(usage_err!("{:?} request passed to {kind:?}", request.kind()));
        }
        let namespace = namespace.clone();
        if uses_write_commands(self.description(), &write_concern) {
            WriteCommandProtocol::new(namespace, ordered, write_concern, requests)
                .execute_sync(&mut self.pooled)
        } else {
            LegacyWriteProtocol::new(namespace, ordered, write_concern, requests)
                .execute_sync(&mut self.pooled)
        }
    }
}
