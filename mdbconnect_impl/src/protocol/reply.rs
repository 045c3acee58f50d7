use crate::{
    protocol::{request::MESSAGE_HEADER_LENGTH, OpCode},
    MdbError, MdbResult,
};
use bson::{Bson, Document};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

const CURSOR_NOT_FOUND: i32 = 1;
const QUERY_FAILURE: i32 = 1 << 1;

/// The header of a message received from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    message_length: i32,
    request_id: i32,
    response_to: i32,
    op_code: OpCode,
}
impl ReplyHeader {
    fn parse(rdr: &mut Cursor<&[u8]>) -> MdbResult<Self> {
        Ok(Self {
            message_length: rdr.read_i32::<LittleEndian>()?, // I4
            request_id: rdr.read_i32::<LittleEndian>()?,     // I4
            response_to: rdr.read_i32::<LittleEndian>()?,    // I4
            op_code: OpCode::try_from_i32(rdr.read_i32::<LittleEndian>()?)?, // I4
        })
    }
    /// Length of the complete message.
    pub fn message_length(&self) -> i32 {
        self.message_length
    }
    /// Id of the reply message.
    pub fn request_id(&self) -> i32 {
        self.request_id
    }
    /// Id of the request this is the reply to.
    pub fn response_to(&self) -> i32 {
        self.response_to
    }
}

/// A reply to a query, command or get-more.
#[derive(Debug, Clone)]
pub struct Reply {
    header: ReplyHeader,
    response_flags: i32,
    cursor_id: i64,
    starting_from: i32,
    documents: Vec<Document>,
}
impl Reply {
    // Parses a complete reply message, including the header.
    pub(crate) fn parse(message: &[u8], expected_response_to: i32) -> MdbResult<Self> {
        let mut rdr = Cursor::new(message);
        let header = ReplyHeader::parse(&mut rdr)?;
        if usize::try_from(header.message_length).ok() != Some(message.len()) {
            return Err(protocol_err!(
                "reply length {} does not match the received {} bytes",
                header.message_length,
                message.len()
            ));
        }
        if header.op_code != OpCode::Reply {
            return Err(protocol_err!("expected a reply, got {:?}", header.op_code));
        }
        if header.response_to != expected_response_to {
            return Err(protocol_err!(
                "reply is for request {}, but request {} was sent",
                header.response_to,
                expected_response_to
            ));
        }
        let response_flags = rdr.read_i32::<LittleEndian>()?; // I4
        let cursor_id = rdr.read_i64::<LittleEndian>()?; // I8
        let starting_from = rdr.read_i32::<LittleEndian>()?; // I4
        let number_returned = rdr.read_i32::<LittleEndian>()?; // I4
        let number_returned = usize::try_from(number_returned)
            .map_err(|_| protocol_err!("negative number of returned documents"))?;

        let mut documents = Vec::with_capacity(number_returned.min(1024));
        for _ in 0..number_returned {
            documents.push(Document::from_reader(&mut rdr)?);
        }
        if usize::try_from(rdr.position()).ok() != Some(message.len()) {
            return Err(protocol_err!("reply has trailing bytes"));
        }
        trace!(
            "parsed reply {} to {} with {} documents",
            header.request_id,
            header.response_to,
            documents.len()
        );
        Ok(Self {
            header,
            response_flags,
            cursor_id,
            starting_from,
            documents,
        })
    }

    /// The header.
    pub fn header(&self) -> &ReplyHeader {
        &self.header
    }
    /// The id of the server-side cursor; 0 if the cursor is exhausted.
    pub fn cursor_id(&self) -> i64 {
        self.cursor_id
    }
    /// Position of the first returned document in the cursor.
    pub fn starting_from(&self) -> i32 {
        self.starting_from
    }
    /// The returned documents.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }
    /// Takes the returned documents.
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
    /// The server did not know the cursor of a get-more.
    pub fn is_cursor_not_found(&self) -> bool {
        self.response_flags & CURSOR_NOT_FOUND != 0
    }
    /// The query failed; the first document describes the error.
    pub fn is_query_failure(&self) -> bool {
        self.response_flags & QUERY_FAILURE != 0
    }

    // Converts a query failure into an error.
    pub(crate) fn into_query_result(self) -> MdbResult<Self> {
        if self.is_query_failure() {
            let document = self.documents.first();
            return Err(MdbError::Command {
                code: document.and_then(|d| get_number(d, "code")).map_or(0, narrow),
                message: document
                    .and_then(|d| d.get_str("$err").ok())
                    .unwrap_or("query failure without details")
                    .to_string(),
            });
        }
        if self.is_cursor_not_found() {
            return Err(MdbError::Command {
                code: 43,
                message: format!("cursor {} not found", self.cursor_id),
            });
        }
        Ok(self)
    }

    // The single result document of a command, checked for `ok: 1`.
    pub(crate) fn into_command_result(self) -> MdbResult<Document> {
        let reply = self.into_query_result()?;
        let document = reply
            .documents
            .into_iter()
            .next()
            .ok_or_else(|| protocol_err!("command reply without a document"))?;
        command_ok(document)
    }
}

// Checks the `ok` field of a command result.
pub(crate) fn command_ok(document: Document) -> MdbResult<Document> {
    if get_number(&document, "ok") == Some(1) {
        Ok(document)
    } else {
        Err(MdbError::Command {
            code: get_number(&document, "code").map_or(0, narrow),
            message: document
                .get_str("errmsg")
                .unwrap_or("command failed without details")
                .to_string(),
        })
    }
}

// Reads a numeric field regardless of its BSON number type.
pub(crate) fn get_number(document: &Document, key: &str) -> Option<i64> {
    match document.get(key)? {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) if f.is_finite() => Some(*f as i64),
        Bson::Boolean(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn narrow(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// Only used by tests and the fake servers in them.
#[cfg(test)]
pub(crate) fn encode_reply(
    response_to: i32,
    response_flags: i32,
    cursor_id: i64,
    documents: &[Document],
) -> Vec<u8> {
    use byteorder::WriteBytesExt;
    let mut buf = Vec::new();
    buf.write_i32::<LittleEndian>(0).unwrap();
    buf.write_i32::<LittleEndian>(crate::protocol::request::next_request_id())
        .unwrap();
    buf.write_i32::<LittleEndian>(response_to).unwrap();
    buf.write_i32::<LittleEndian>(OpCode::Reply.to_i32()).unwrap();
    buf.write_i32::<LittleEndian>(response_flags).unwrap();
    buf.write_i64::<LittleEndian>(cursor_id).unwrap();
    buf.write_i32::<LittleEndian>(0).unwrap();
    buf.write_i32::<LittleEndian>(i32::try_from(documents.len()).unwrap())
        .unwrap();
    for d in documents {
        d.to_writer(&mut buf).unwrap();
    }
    let len = i32::try_from(buf.len()).unwrap();
    buf[0..4].copy_from_slice(&len.to_le_bytes());
    buf
}

pub(crate) fn check_message_length(length: i32, max_message_size: usize) -> MdbResult<usize> {
    match usize::try_from(length) {
        Ok(length) if (MESSAGE_HEADER_LENGTH..=max_message_size).contains(&length) => Ok(length),
        _ => Err(protocol_err!(
            "invalid message length {length}, the limit is {max_message_size}"
        )),
    }
}

#[cfg(test)]
mod test {
    use super::{command_ok, encode_reply, get_number, Reply};
    use crate::MdbError;
    use bson::doc;

    #[test]
    fn test_parse_reply() {
        let bytes = encode_reply(42, 0, 99, &[doc! {"a": 1}, doc! {"b": 2}]);
        let reply = Reply::parse(&bytes, 42).unwrap();
        assert_eq!(reply.cursor_id(), 99);
        assert_eq!(reply.documents().len(), 2);
        assert!(Reply::parse(&bytes, 43).is_err());
        assert!(Reply::parse(&bytes[..bytes.len() - 1], 42).is_err());
    }

    #[test]
    fn test_query_failure() {
        let bytes = encode_reply(7, 2, 0, &[doc! {"$err": "bad query", "code": 17287}]);
        let err = Reply::parse(&bytes, 7)
            .unwrap()
            .into_query_result()
            .unwrap_err();
        assert!(matches!(err, MdbError::Command { code: 17287, .. }));
    }

    #[test]
    fn test_command_ok() {
        assert!(command_ok(doc! {"ok": 1.0}).is_ok());
        assert!(command_ok(doc! {"ok": 1}).is_ok());
        let err = command_ok(doc! {"ok": 0.0, "errmsg": "no such cmd", "code": 59}).unwrap_err();
        assert_eq!(err.server_code(), Some(59));
        assert_eq!(get_number(&doc! {"n": 3_i64}, "n"), Some(3));
        assert_eq!(get_number(&doc! {"n": "3"}, "n"), None);
    }
}
