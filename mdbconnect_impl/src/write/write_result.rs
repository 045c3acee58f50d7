use crate::{protocol::reply::get_number, write::WriteKind, MdbError, MdbResult};
use bson::{Bson, Document};

/// A document that was inserted by an upsert.
#[derive(Clone, Debug, PartialEq)]
pub struct Upsert {
    index: usize,
    id: Bson,
}
impl Upsert {
    /// Index of the causing request within the complete request list.
    pub fn index(&self) -> usize {
        self.index
    }
    /// The `_id` of the inserted document.
    pub fn id(&self) -> &Bson {
        &self.id
    }
}

/// The outcome of a write.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteResult {
    kind: WriteKind,
    acknowledged: bool,
    count: usize,
    modified_count: Option<usize>,
    upserts: Vec<Upsert>,
}
impl WriteResult {
    /// The result of a write for which the server was not asked for anything.
    pub fn unacknowledged(kind: WriteKind) -> Self {
        Self {
            kind,
            acknowledged: false,
            count: 0,
            modified_count: None,
            upserts: Vec::new(),
        }
    }

    /// The kind of the write.
    pub fn kind(&self) -> WriteKind {
        self.kind
    }

    /// False if the server did not confirm the write; the counts are meaningless then.
    pub fn was_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// The number of inserted, matched-or-upserted, or deleted documents.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The number of documents an update matched.
    pub fn matched_count(&self) -> usize {
        match self.kind {
            WriteKind::Update => self.count.saturating_sub(self.upserts.len()),
            WriteKind::Insert | WriteKind::Delete => 0,
        }
    }

    /// The number of documents an update really changed.
    ///
    /// Is `None` for servers that do not report it.
    pub fn modified_count(&self) -> Option<usize> {
        self.modified_count
    }

    /// The documents that were inserted by upserts.
    pub fn upserts(&self) -> &[Upsert] {
        &self.upserts
    }
}

/// A request of a write that the server could not execute.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteError {
    index: usize,
    code: i32,
    message: String,
    details: Option<Document>,
}
impl WriteError {
    /// Index of the failing request within the complete request list.
    pub fn index(&self) -> usize {
        self.index
    }
    /// Error code provided by the server.
    pub fn code(&self) -> i32 {
        self.code
    }
    /// Error message provided by the server.
    pub fn message(&self) -> &str {
        &self.message
    }
    /// Additional information provided by the server.
    pub fn details(&self) -> Option<&Document> {
        self.details.as_ref()
    }
}
impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "request {} failed with code {}: {}",
            self.index, self.code, self.message
        )
    }
}

/// The server executed a write but could not satisfy the write concern.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteConcernError {
    code: i32,
    message: String,
    details: Option<Document>,
}
impl WriteConcernError {
    pub(crate) fn new(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            details: None,
        }
    }
    /// Error code provided by the server.
    pub fn code(&self) -> i32 {
        self.code
    }
    /// Error message provided by the server.
    pub fn message(&self) -> &str {
        &self.message
    }
    /// Additional information provided by the server.
    pub fn details(&self) -> Option<&Document> {
        self.details.as_ref()
    }
}
impl std::fmt::Display for WriteConcernError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

// Code the server uses for a failed write concern without more specific information.
const WRITE_CONCERN_FAILED: i32 = 64;
const BAD_VALUE: i32 = 2;
const UNKNOWN_ERROR: i32 = 8;

// Collects the results of the messages of one write.
//
// Indices the server reports are relative to the message; `offset` maps them back
// into the complete request list.
#[derive(Debug)]
pub(crate) struct WriteResultCombiner {
    kind: WriteKind,
    count: usize,
    modified_count: Option<usize>,
    upserts: Vec<Upsert>,
    write_errors: Vec<WriteError>,
    write_concern_error: Option<WriteConcernError>,
    acknowledged: bool,
}
impl WriteResultCombiner {
    pub(crate) fn new(kind: WriteKind) -> Self {
        Self {
            kind,
            count: 0,
            modified_count: Some(0),
            upserts: Vec::new(),
            write_errors: Vec::new(),
            write_concern_error: None,
            acknowledged: false,
        }
    }

    pub(crate) fn kind(&self) -> WriteKind {
        self.kind
    }

    pub(crate) fn has_write_errors(&self) -> bool {
        !self.write_errors.is_empty()
    }

    // Adds the checked result document of a write command.
    pub(crate) fn add_command_reply(&mut self, reply: &Document, offset: usize) -> MdbResult<()> {
        self.acknowledged = true;
        self.count += to_count(get_number(reply, "n"));
        match get_number(reply, "nModified") {
            Some(n) => {
                if let Some(ref mut modified) = self.modified_count {
                    *modified += to_count(Some(n));
                }
            }
            None if self.kind == WriteKind::Update => self.modified_count = None,
            None => {}
        }
        if let Ok(upserted) = reply.get_array("upserted") {
            for item in upserted {
                let item = as_document(item)?;
                self.upserts.push(Upsert {
                    index: offset + to_count(get_number(item, "index")),
                    id: item.get("_id").cloned().unwrap_or(Bson::Null),
                });
            }
        }
        if let Ok(errors) = reply.get_array("writeErrors") {
            for item in errors {
                let item = as_document(item)?;
                self.write_errors.push(WriteError {
                    index: offset + to_count(get_number(item, "index")),
                    code: to_code(get_number(item, "code")),
                    message: item.get_str("errmsg").unwrap_or_default().to_string(),
                    details: item.get_document("errInfo").ok().cloned(),
                });
            }
        }
        if let Ok(wce) = reply.get_document("writeConcernError") {
            self.write_concern_error = Some(WriteConcernError {
                code: to_code(get_number(wce, "code")),
                message: wce.get_str("errmsg").unwrap_or_default().to_string(),
                details: wce.get_document("errInfo").ok().cloned(),
            });
        }
        Ok(())
    }

    // Adds the reply to a `getlasterror` that followed a legacy write message with
    // `item_count` requests, the first of which is at `offset`.
    pub(crate) fn add_last_error(&mut self, reply: &Document, offset: usize, item_count: usize) {
        self.acknowledged = true;
        // legacy servers do not tell how many documents an update changed
        self.modified_count = None;

        let error_message = reply.get_str("err").ok();
        let code = get_number(reply, "code").map(|c| to_code(Some(c)));
        let timed_out = reply.get_bool("wtimeout").unwrap_or(false);
        let note = reply
            .get_str("wnote")
            .or_else(|_| reply.get_str("jnote"))
            .ok();

        if let Some(note) = note {
            self.write_concern_error = Some(WriteConcernError::new(
                code.unwrap_or(BAD_VALUE),
                note.to_string(),
            ));
        } else if let Some(message) = error_message {
            if timed_out || code == Some(WRITE_CONCERN_FAILED) {
                self.write_concern_error = Some(WriteConcernError::new(
                    code.unwrap_or(WRITE_CONCERN_FAILED),
                    message.to_string(),
                ));
            } else {
                self.write_errors.push(WriteError {
                    index: offset,
                    code: code.unwrap_or(UNKNOWN_ERROR),
                    message: message.to_string(),
                    details: None,
                });
                return;
            }
        }

        match self.kind {
            WriteKind::Insert => self.count += item_count,
            WriteKind::Update => {
                let n = to_count(get_number(reply, "n"));
                self.count += n;
                if let Some(id) = reply.get("upserted").filter(|id| **id != Bson::Null) {
                    self.upserts.push(Upsert {
                        index: offset,
                        id: id.clone(),
                    });
                }
            }
            WriteKind::Delete => self.count += to_count(get_number(reply, "n")),
        }
    }

    pub(crate) fn finish(self) -> MdbResult<WriteResult> {
        let result = WriteResult {
            kind: self.kind,
            acknowledged: self.acknowledged,
            count: self.count,
            modified_count: if self.acknowledged {
                self.modified_count
            } else {
                None
            },
            upserts: self.upserts,
        };
        if !self.write_errors.is_empty() {
            Err(MdbError::WriteErrors {
                result,
                errors: self.write_errors,
                write_concern_error: self.write_concern_error,
            })
        } else if let Some(error) = self.write_concern_error {
            Err(MdbError::WriteConcern { result, error })
        } else {
            Ok(result)
        }
    }
}

fn as_document(bson: &Bson) -> MdbResult<&Document> {
    match bson {
        Bson::Document(d) => Ok(d),
        other => Err(protocol_err!("expected a document in write reply, got {other}")),
    }
}

fn to_count(n: Option<i64>) -> usize {
    n.and_then(|n| usize::try_from(n).ok()).unwrap_or(0)
}

fn to_code(n: Option<i64>) -> i32 {
    n.and_then(|n| i32::try_from(n).ok()).unwrap_or(0)
}
