mod bson_output;
mod cursor_messages;
mod legacy_write_messages;
mod message_settings;
mod namespace;
mod op_code;
mod query_message;
pub(crate) mod reply;
pub(crate) mod request;
#[cfg(feature = "async")]
pub(crate) mod util_async;
#[cfg(feature = "sync")]
pub(crate) mod util_sync;
mod write_command_message;

pub(crate) use self::{
    bson_output::BsonOutput,
    cursor_messages::{GetMoreMessage, KillCursorsMessage},
    legacy_write_messages::LegacyWriteMessage,
    query_message::QueryMessage,
    request::RequestMessage,
    write_command_message::WriteCommandMessage,
};
pub use self::{
    message_settings::MessageSettings,
    namespace::Namespace,
    op_code::OpCode,
    query_message::{QueryFlags, QueryOptions},
    reply::{Reply, ReplyHeader},
};

#[cfg(test)]
pub(crate) use self::write_command_message::test::decode_command;
