use crate::{
    conn::{
        roundtrip_async, run_command_async, AsyncWireConnection, ConnectionCore,
        ConnectionCoreFactory, ConnectionDescription, ConnectionInfo, ConnectionStatistics,
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
/// All operations are non-blocking.
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
    pub async fn command(&mut self, database: &str, command: Document) -> MdbResult<Document> {
        run_command_async(&mut self.pooled, database, command).await
    }

    /// Runs a query and returns the first batch; use the reply's cursor id to fetch more.
    ///
    /// # Errors
    ///
    /// `MdbError::Command` if the server reports a query failure, and transport errors.
    pub async fn query(
        &mut self,
        namespace: &Namespace,
        filter: Document,
        options: QueryOptions,
    ) -> MdbResult<Reply> {
        let message = QueryMessage::new(namespace.clone(), filter, self.pooled.message_settings())
            .with_options(options);
        roundtrip_async(&mut self.pooled, &message)
            .await?
            .into_query_result()
    }

    /// Fetches the next batch of a cursor.
    ///
    /// # Errors
    ///
    /// `MdbError::Command` if the cursor is unknown to the server, and transport errors.
    pub async fn get_more(
        &mut self,
        namespace: &Namespace,
        cursor_id: i64,
        number_to_return: i32,
    ) -> MdbResult<Reply> {
        let message = GetMoreMessage::new(namespace.clone(), cursor_id, number_to_return);
        roundtrip_async(&mut self.pooled, &message)
            .await?
            .into_query_result()
    }

    /// Closes cursors on the server; the server does not answer.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` for an empty list, and transport errors.
    pub async fn kill_cursors(&mut self, cursor_ids: Vec<i64>) -> MdbResult<()> {
        let message = KillCursorsMessage::try_new(cursor_ids)?;
        let (out, request_id, _) = encode_message(&message)?;
        self.pooled
            .send_message_async(out.as_slice(), request_id)
            .await
    }

    /// Inserts documents.
    ///
    /// # Errors
    ///
    /// `MdbError::WriteErrors` or `MdbError::WriteConcern` with the partial result,
    /// `MdbError::SizeLimit` for a document the server cannot take, and transport errors.
    pub async fn insert(
        &mut self,
        namespace: &Namespace,
        documents: Vec<Document>,
        ordered: bool,
        write_concern: WriteConcern,
    ) -> MdbResult<WriteResult> {
        let requests = documents.into_iter().map(WriteRequest::insert).collect();
        self.write(namespace, WriteKind::Insert, requests, ordered, write_concern)
            .await
    }

    /// Executes update requests.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if a request is not an update; otherwise like
    /// [`Connection::insert`].
    pub async fn update(
        &mut self,
        namespace: &Namespace,
        requests: Vec<WriteRequest>,
        ordered: bool,
        write_concern: WriteConcern,
    ) -> MdbResult<WriteResult> {
        self.write(namespace, WriteKind::Update, requests, ordered, write_concern)
            .await
    }

    /// Executes delete requests.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if a request is not a delete; otherwise like
    /// [`Connection::insert`].
    pub async fn delete(
        &mut self,
        namespace: &Namespace,
        requests: Vec<WriteRequest>,
        ordered: bool,
        write_concern: WriteConcern,
    ) -> MdbResult<WriteResult> {
        self.write(namespace, WriteKind::Delete, requests, ordered, write_concern)
            .await
    }

    async fn write(
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
                .execute_async(&mut self.pooled)
                .await
        } else {
            LegacyWriteProtocol::new(namespace, ordered, write_concern, requests)
                .execute_async(&mut self.pooled)
                .await
        }
    }
}
