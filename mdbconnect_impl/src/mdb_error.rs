use crate::{
    conn::{AuthMechanism, Credential},
    write::{WriteConcernError, WriteError, WriteResult},
};
use std::{borrow::Cow, error::Error, time::Duration};
use thiserror::Error;

/// A list specifying categories of [`MdbError`](crate::MdbError).
///
/// The variants that matter most for callers are
/// - [`MdbError::Timeout`] and [`MdbError::WaitQueueFull`], which are reported by the
///   connection pool and leave its state unaffected,
/// - [`MdbError::Io`] and [`MdbError::ConnectionBroken`], the transport-level failures
///   that taint the whole pool of the affected server,
/// - [`MdbError::WriteConcern`], which carries the partial result of a write that was
///   executed but could not satisfy the requested durability,
/// - [`MdbError::Authentication`], which wraps the error that made the handshake fail.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MdbError {
    /// Authentication failed; the source error gives the details.
    #[error(
        "Authentication of user {user} against database {source_db} with {} failed",
        .mechanism.name()
    )]
    Authentication {
        /// The user that tried to log on.
        user: String,
        /// The database that holds the user's definition.
        source_db: String,
        /// The mechanism that was used.
        mechanism: AuthMechanism,
        /// The causing Error.
        source: Box<MdbError>,
    },

    /// Deserialization of a BSON document failed.
    #[error("Error occured in deserialization of a BSON document")]
    BsonDeserialization {
        /// The causing Error.
        #[from]
        source: bson::de::Error,
    },

    /// Serialization of a BSON document failed.
    #[error("Error occured in serialization of a BSON document")]
    BsonSerialization {
        /// The causing Error.
        #[from]
        source: bson::ser::Error,
    },

    /// The server answered a command with `ok: 0`, or flagged a query failure.
    #[error("Command failed on the server with code {code}: {message}")]
    Command {
        /// Error code provided by the server.
        code: i32,
        /// Error message provided by the server.
        message: String,
    },

    /// The connection was already broken by a previous error.
    #[error("Connection is broken: {}", _0)]
    ConnectionBroken(Cow<'static, str>),

    /// Error occured in thread synchronization.
    #[error("Error occured in thread synchronization")]
    Poison,

    /// The connection pool was closed.
    #[error("The connection pool is closed")]
    PoolClosed,

    /// Error occured in communication with the database.
    #[error("Error occured in communication with the database")]
    Io {
        /// The causing Error.
        #[from]
        source: std::io::Error,
    },

    /// Implementation error.
    #[error("Implementation error: {}", _0)]
    Impl(Cow<'static, str>),

    /// The server sent something that does not match the protocol.
    #[error("Protocol error: {}", _0)]
    Protocol(Cow<'static, str>),

    /// A document or message is too large for the server, and splitting cannot help.
    #[error("{what} has {actual} bytes, which exceeds the limit of {limit} bytes")]
    SizeLimit {
        /// What exceeded the limit.
        what: &'static str,
        /// The actual size.
        actual: usize,
        /// The limit reported by the server.
        limit: usize,
    },

    /// No connection became available in the pool within the given time.
    #[error("Timed out after {waited:?} while waiting for a connection")]
    Timeout {
        /// The time that was waited.
        waited: Duration,
    },

    /// Error occured in evaluation of a parameter value.
    #[error("Wrong usage: {}", _0)]
    Usage(Cow<'static, str>),

    /// Too many callers are already waiting for a connection of this pool.
    #[error("Too many waiters for a connection, the limit is {max}")]
    WaitQueueFull {
        /// The configured maximum number of concurrent waiters.
        max: usize,
    },

    /// The write was executed, but the requested write concern could not be satisfied.
    #[error("Write concern error: {error}")]
    WriteConcern {
        /// What was achieved before the error was detected.
        result: WriteResult,
        /// The error reported by the server.
        error: WriteConcernError,
    },

    /// Some items of a write could not be executed.
    #[error("{} write error(s) occured", errors.len())]
    WriteErrors {
        /// What was achieved despite the errors.
        result: WriteResult,
        /// The individual errors, with indices relative to the complete request list.
        errors: Vec<WriteError>,
        /// A write concern error that may have been reported in addition.
        write_concern_error: Option<WriteConcernError>,
    },
}

/// Abbreviation of `Result<T, MdbError>`.
pub type MdbResult<T> = std::result::Result<T, MdbError>;

impl MdbError {
    /// Returns the contained `MdbError`, if any.
    ///
    /// This method helps in case you need programmatic access to e.g. the error details
    /// of a failed authentication.
    pub fn inner(&self) -> Option<&Self> {
        match self {
            Self::Authentication { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns true if the error was caused on the transport level.
    ///
    /// Such errors make all other pooled connections to the same server suspect.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Io { .. } | Self::ConnectionBroken(_) => true,
            Self::Authentication { source, .. } => source.is_transport(),
            _ => false,
        }
    }

    /// Returns the error code that was provided by the server, if any.
    pub fn server_code(&self) -> Option<i32> {
        match self {
            Self::Command { code, .. } => Some(*code),
            Self::WriteConcern { error, .. } => Some(error.code()),
            Self::WriteErrors { errors, .. } => errors.first().map(WriteError::code),
            Self::Authentication { source, .. } => source.server_code(),
            _ => None,
        }
    }

    /// Returns a decent printable representation rather than the Debug representation.
    pub fn display_with_inner(&self) -> String {
        match self.source() {
            Some(e) => format!("{self}, caused by {e}"),
            None => format!("{self}"),
        }
    }

    pub(crate) fn authentication(
        source: Self,
        credential: &Credential,
        mechanism: AuthMechanism,
    ) -> Self {
        match source {
            e @ Self::Authentication { .. } => e,
            e => Self::Authentication {
                user: credential.user_name().to_string(),
                source_db: credential.source().to_string(),
                mechanism,
                source: Box::new(e),
            },
        }
    }
}

impl<G> From<std::sync::PoisonError<G>> for MdbError {
    fn from(_error: std::sync::PoisonError<G>) -> Self {
        Self::Poison
    }
}

impl From<crypto_common::InvalidLength> for MdbError {
    fn from(_error: crypto_common::InvalidLength) -> Self {
        Self::Impl(Cow::Borrowed("cryptographic input has an invalid length"))
    }
}

impl From<bson::document::ValueAccessError> for MdbError {
    fn from(error: bson::document::ValueAccessError) -> Self {
        Self::Protocol(Cow::Owned(format!(
            "unexpected content in reply document: {error}"
        )))
    }
}

macro_rules! impl_err {
    ($($arg:tt)*) => {{
        crate::MdbError::Impl(std::borrow::Cow::Owned(format!($($arg)*)))
    }};
}

macro_rules! usage_err {
    ($($arg:tt)*) => {{
        crate::MdbError::Usage(std::borrow::Cow::Owned(format!($($arg)*)))
    }};
}

macro_rules! protocol_err {
    ($($arg:tt)*) => {{
        crate::MdbError::Protocol(std::borrow::Cow::Owned(format!($($arg)*)))
    }};
}
