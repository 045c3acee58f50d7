use crate::{
    protocol::{
        request::{next_request_id, RequestMessage, HEADROOM},
        BsonOutput, MessageSettings, Namespace, OpCode,
    },
    MdbError, MdbResult,
};
use bson::Document;

/// Flags of a query message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryFlags(i32);
impl QueryFlags {
    const TAILABLE_CURSOR: i32 = 1 << 1;
    const SLAVE_OK: i32 = 1 << 2;
    const NO_CURSOR_TIMEOUT: i32 = 1 << 4;
    const AWAIT_DATA: i32 = 1 << 5;
    const EXHAUST: i32 = 1 << 6;
    const PARTIAL: i32 = 1 << 7;

    fn with(self, bit: i32, on: bool) -> Self {
        if on {
            Self(self.0 | bit)
        } else {
            Self(self.0 & !bit)
        }
    }

    /// Keep the cursor open after the last document.
    #[must_use]
    pub fn with_tailable_cursor(self, on: bool) -> Self {
        self.with(Self::TAILABLE_CURSOR, on)
    }
    /// Allow the query to run on a secondary.
    #[must_use]
    pub fn with_slave_ok(self, on: bool) -> Self {
        self.with(Self::SLAVE_OK, on)
    }
    /// Do not time out idle cursors.
    #[must_use]
    pub fn with_no_cursor_timeout(self, on: bool) -> Self {
        self.with(Self::NO_CURSOR_TIMEOUT, on)
    }
    /// Block a tailable cursor for a while if no data is available.
    #[must_use]
    pub fn with_await_data(self, on: bool) -> Self {
        self.with(Self::AWAIT_DATA, on)
    }
    /// Stream all data in multiple replies.
    #[must_use]
    pub fn with_exhaust(self, on: bool) -> Self {
        self.with(Self::EXHAUST, on)
    }
    /// Return partial results if some shards are down.
    #[must_use]
    pub fn with_partial(self, on: bool) -> Self {
        self.with(Self::PARTIAL, on)
    }
    /// The wire representation.
    pub fn bits(self) -> i32 {
        self.0
    }
}

// A query, or a command, which is a query for exactly one document against `<db>.$cmd`.
#[derive(Debug)]
pub(crate) struct QueryMessage {
    request_id: i32,
    namespace: Namespace,
    flags: QueryFlags,
    skip: i32,
    number_to_return: i32,
    query: Document,
    fields: Option<Document>,
    settings: MessageSettings,
}
impl QueryMessage {
    pub(crate) fn new(namespace: Namespace, query: Document, settings: MessageSettings) -> Self {
        Self {
            request_id: next_request_id(),
            namespace,
            flags: QueryFlags::default(),
            skip: 0,
            number_to_return: 0,
            query,
            fields: None,
            settings,
        }
    }

    pub(crate) fn command(
        database: &str,
        command: Document,
        settings: MessageSettings,
    ) -> MdbResult<Self> {
        Ok(Self::new(Namespace::command_collection(database)?, command, settings)
            .with_number_to_return(-1))
    }

    pub(crate) fn with_number_to_return(mut self, number_to_return: i32) -> Self {
        self.number_to_return = number_to_return;
        self
    }
    pub(crate) fn with_options(self, options: QueryOptions) -> Self {
        Self {
            flags: options.flags,
            skip: options.skip,
            number_to_return: options.number_to_return,
            fields: options.fields,
            ..self
        }
    }
}

/// How a query is to be run, besides its filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    flags: QueryFlags,
    skip: i32,
    number_to_return: i32,
    fields: Option<Document>,
}
impl QueryOptions {
    /// Builder method to set the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: QueryFlags) -> Self {
        self.flags = flags;
        self
    }
    /// Builder method to set the number of documents to skip.
    #[must_use]
    pub fn with_skip(mut self, skip: i32) -> Self {
        self.skip = skip;
        self
    }
    /// Builder method to set the size of the first batch.
    ///
    /// 0 lets the server decide, a negative value closes the cursor after the first batch.
    #[must_use]
    pub fn with_number_to_return(mut self, number_to_return: i32) -> Self {
        self.number_to_return = number_to_return;
        self
    }
    /// Builder method to restrict the returned fields.
    #[must_use]
    pub fn with_fields(mut self, fields: Document) -> Self {
        self.fields = Some(fields);
        self
    }
}

impl RequestMessage for QueryMessage {
    fn request_id(&self) -> i32 {
        self.request_id
    }
    fn op_code(&self) -> OpCode {
        OpCode::Query
    }
    fn encode_body(&self, out: &mut BsonOutput, _message_start: usize) -> MdbResult<Option<Self>> {
        out.write_i32(self.flags.bits())?; // I4
        out.write_cstring(&self.namespace.full_name())?;
        out.write_i32(self.skip)?; // I4
        out.write_i32(self.number_to_return)?; // I4
        let size = out.write_document(&self.query)?;
        let limit = self.settings.max_document_size() + HEADROOM;
        if size > limit {
            return Err(MdbError::SizeLimit {
                what: "query document",
                actual: size,
                limit,
            });
        }
        if let Some(ref fields) = self.fields {
            out.write_document(fields)?;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::{QueryFlags, QueryMessage, QueryOptions};
    use crate::protocol::{request::RequestMessage, BsonOutput, MessageSettings, OpCode};
    use bson::{doc, Document};
    use byteorder::{LittleEndian, ReadBytesExt};
    use std::io::{BufRead, Cursor};

    #[test]
    fn test_command_layout() {
        let msg = QueryMessage::command("admin", doc! {"isMaster": 1}, MessageSettings::default())
            .unwrap()
            .with_options(QueryOptions::default()
                .with_flags(QueryFlags::default().with_slave_ok(true))
                .with_number_to_return(-1));
        let mut out = BsonOutput::new();
        let metadata = msg.encode(&mut out).unwrap();
        assert_eq!(metadata.request_id(), msg.request_id);

        let mut rdr = Cursor::new(out.as_slice());
        let length = rdr.read_i32::<LittleEndian>().unwrap();
        assert_eq!(length as usize, rdr.get_ref().len());
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), msg.request_id);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), 0);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), OpCode::Query.to_i32());
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), 4);
        let mut ns = Vec::new();
        rdr.read_until(0, &mut ns).unwrap();
        assert_eq!(&ns, b"admin.$cmd\0");
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), 0);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), -1);
        let command = Document::from_reader(&mut rdr).unwrap();
        assert_eq!(command, doc! {"isMaster": 1});
    }

    #[test]
    fn test_ids_are_increasing() {
        let m1 = QueryMessage::command("a", doc! {}, MessageSettings::default()).unwrap();
        let m2 = QueryMessage::command("a", doc! {}, MessageSettings::default()).unwrap();
        assert!(m2.request_id > m1.request_id);
    }

    #[test]
    fn test_oversized_query_is_rejected() {
        let settings = MessageSettings::try_new(64, 1_000_000, 10).unwrap();
        let msg = QueryMessage::command("a", doc! {"x": "y".repeat(20_000)}, settings).unwrap();
        assert!(msg.encode(&mut BsonOutput::new()).is_err());
    }
}
