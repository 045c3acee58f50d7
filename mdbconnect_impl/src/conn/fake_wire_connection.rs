// A wire connection that answers from a script, for unit tests.
use crate::{
    conn::{ConnectionDescription, ConnectionInfo},
    protocol::{reply::encode_reply, Reply},
    MdbError, MdbResult,
};
#[cfg(feature = "async")]
use crate::conn::AsyncWireConnection;
#[cfg(feature = "sync")]
use crate::conn::WireConnection;
#[cfg(feature = "async")]
use async_trait::async_trait;
use bson::Document;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub(crate) struct FakeWireConnection {
    pub(crate) description: Option<ConnectionDescription>,
    pub(crate) replies: VecDeque<Document>,
    // every sent buffer, with the last request id it contains
    pub(crate) sent: Vec<(Vec<u8>, i32)>,
    pub(crate) received: usize,
}
impl FakeWireConnection {
    pub(crate) fn new(description: ConnectionDescription, replies: Vec<Document>) -> Self {
        Self {
            description: Some(description),
            replies: replies.into(),
            sent: Vec::new(),
            received: 0,
        }
    }

    fn send(&mut self, message: &[u8], last_request_id: i32) {
        self.sent.push((message.to_vec(), last_request_id));
    }

    fn receive(&mut self, response_to: i32) -> MdbResult<Reply> {
        let document = self.replies.pop_front().ok_or_else(|| {
            MdbError::ConnectionBroken(std::borrow::Cow::Borrowed("script exhausted"))
        })?;
        self.received += 1;
        Reply::parse(&encode_reply(response_to, 0, 0, &[document]), response_to)
    }
}

impl ConnectionInfo for FakeWireConnection {
    fn description(&self) -> Option<&ConnectionDescription> {
        self.description.as_ref()
    }
}

#[cfg(feature = "sync")]
impl WireConnection for FakeWireConnection {
    fn send_message_sync(&mut self, message: &[u8], last_request_id: i32) -> MdbResult<()> {
        self.send(message, last_request_id);
        Ok(())
    }
    fn receive_message_sync(&mut self, response_to: i32) -> MdbResult<Reply> {
        self.receive(response_to)
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncWireConnection for FakeWireConnection {
    async fn send_message_async(&mut self, message: &[u8], last_request_id: i32) -> MdbResult<()> {
        self.send(message, last_request_id);
        Ok(())
    }
    async fn receive_message_async(&mut self, response_to: i32) -> MdbResult<Reply> {
        self.receive(response_to)
    }
}
