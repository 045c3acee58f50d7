use crate::{
    protocol::{
        request::{next_request_id, RequestMessage},
        BsonOutput, Namespace, OpCode,
    },
    MdbResult,
};

// Fetches the next batch of an open cursor.
#[derive(Debug)]
pub(crate) struct GetMoreMessage {
    request_id: i32,
    namespace: Namespace,
    cursor_id: i64,
    number_to_return: i32,
}
impl GetMoreMessage {
    pub(crate) fn new(namespace: Namespace, cursor_id: i64, number_to_return: i32) -> Self {
        Self {
            request_id: next_request_id(),
            namespace,
            cursor_id,
            number_to_return,
        }
    }
}
impl RequestMessage for GetMoreMessage {
    fn request_id(&self) -> i32 {
        self.request_id
    }
    fn op_code(&self) -> OpCode {
        OpCode::GetMore
    }
    fn encode_body(&self, out: &mut BsonOutput, _: usize) -> MdbResult<Option<Self>> {
        out.write_i32(0)?; // I4 reserved
        out.write_cstring(&self.namespace.full_name())?;
        out.write_i32(self.number_to_return)?; // I4
        out.write_i64(self.cursor_id)?; // I8
        Ok(None)
    }
}

// Closes server-side cursors.
#[derive(Debug)]
pub(crate) struct KillCursorsMessage {
    request_id: i32,
    cursor_ids: Vec<i64>,
}
impl KillCursorsMessage {
    pub(crate) fn try_new(cursor_ids: Vec<i64>) -> MdbResult<Self> {
        if cursor_ids.is_empty() {
            return Err(usage_err!("kill cursors needs at least one cursor id"));
        }
        Ok(Self {
            request_id: next_request_id(),
            cursor_ids,
        })
    }
}
impl RequestMessage for KillCursorsMessage {
    fn request_id(&self) -> i32 {
        self.request_id
    }
    fn op_code(&self) -> OpCode {
        OpCode::KillCursors
    }
    fn encode_body(&self, out: &mut BsonOutput, _: usize) -> MdbResult<Option<Self>> {
        out.write_i32(0)?; // I4 reserved
        out.write_i32(
            i32::try_from(self.cursor_ids.len())
                .map_err(|_| usage_err!("too many cursor ids: {}", self.cursor_ids.len()))?,
        )?;
        for cursor_id in &self.cursor_ids {
            out.write_i64(*cursor_id)?; // I8
        }
        Ok(None)
    }
}
