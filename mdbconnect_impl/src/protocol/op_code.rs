use crate::MdbResult;

/// Identifies the kind of a wire message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpCode {
    /// Reply to a query or get-more.
    Reply,
    /// Legacy update.
    Update,
    /// Legacy insert.
    Insert,
    /// Query; commands are queries against the `$cmd` collection.
    Query,
    /// Fetches the next batch of an open cursor.
    GetMore,
    /// Legacy delete.
    Delete,
    /// Closes server-side cursors.
    KillCursors,
}
impl OpCode {
    pub(crate) fn to_i32(self) -> i32 {
        match self {
            Self::Reply => 1,
            Self::Update => 2001,
            Self::Insert => 2002,
            Self::Query => 2004,
            Self::GetMore => 2005,
            Self::Delete => 2006,
            Self::KillCursors => 2007,
        }
    }

    pub(crate) fn try_from_i32(val: i32) -> MdbResult<Self> {
        match val {
            1 => Ok(Self::Reply),
            2001 => Ok(Self::Update),
            2002 => Ok(Self::Insert),
            2004 => Ok(Self::Query),
            2005 => Ok(Self::GetMore),
            2006 => Ok(Self::Delete),
            2007 => Ok(Self::KillCursors),
            _ => Err(protocol_err!("unknown opcode {val}")),
        }
    }
}
