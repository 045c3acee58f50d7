use bson::{doc, Bson, Document};
use std::time::Duration;

/// How many servers have to confirm a write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acknowledgment {
    /// The given number of servers; zero means that no acknowledgement is requested.
    Nodes(i32),
    /// A majority of the replica set members.
    Majority,
    /// Servers that match a custom tag set configured on the replica set.
    Tag(String),
}
impl From<&Acknowledgment> for Bson {
    fn from(ack: &Acknowledgment) -> Self {
        match ack {
            Acknowledgment::Nodes(n) => Bson::Int32(*n),
            Acknowledgment::Majority => Bson::String("majority".to_string()),
            Acknowledgment::Tag(tag) => Bson::String(tag.clone()),
        }
    }
}

/// Durability requirement of a write.
///
/// A write concern where no field is set leaves the decision to the server.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct WriteConcern {
    w: Option<Acknowledgment>,
    journal: Option<bool>,
    w_timeout: Option<Duration>,
}
impl WriteConcern {
    /// Acknowledged by the server, with the server's default durability.
    pub const ACKNOWLEDGED: Self = Self {
        w: None,
        journal: None,
        w_timeout: None,
    };
    /// Fire and forget.
    pub const UNACKNOWLEDGED: Self = Self {
        w: Some(Acknowledgment::Nodes(0)),
        journal: None,
        w_timeout: None,
    };
    /// Acknowledged by one server.
    pub const W1: Self = Self {
        w: Some(Acknowledgment::Nodes(1)),
        journal: None,
        w_timeout: None,
    };
    /// Acknowledged after the write reached the journal.
    pub const JOURNALED: Self = Self {
        w: Some(Acknowledgment::Nodes(1)),
        journal: Some(true),
        w_timeout: None,
    };
    /// Acknowledged by a majority of the replica set.
    pub const MAJORITY: Self = Self {
        w: Some(Acknowledgment::Majority),
        journal: None,
        w_timeout: None,
    };

    /// Sets the acknowledgment.
    #[must_use]
    pub fn with_w(mut self, w: Acknowledgment) -> Self {
        self.w = Some(w);
        self
    }
    /// Sets whether the write must reach the journal.
    #[must_use]
    pub fn with_journal(mut self, journal: bool) -> Self {
        self.journal = Some(journal);
        self
    }
    /// Sets how long the server may wait for the acknowledgment.
    #[must_use]
    pub fn with_w_timeout(mut self, w_timeout: Duration) -> Self {
        self.w_timeout = Some(w_timeout);
        self
    }

    /// The acknowledgment, if set.
    pub fn w(&self) -> Option<&Acknowledgment> {
        self.w.as_ref()
    }
    /// The journal flag, if set.
    pub fn journal(&self) -> Option<bool> {
        self.journal
    }
    /// The timeout, if set.
    pub fn w_timeout(&self) -> Option<Duration> {
        self.w_timeout
    }

    /// False only if no server confirmation is requested at all.
    pub fn is_acknowledged(&self) -> bool {
        !(self.w == Some(Acknowledgment::Nodes(0)) && self.journal != Some(true))
    }

    /// True if no field is set.
    pub fn is_server_default(&self) -> bool {
        self.w.is_none() && self.journal.is_none() && self.w_timeout.is_none()
    }

    /// The representation in a command document.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        if let Some(ref w) = self.w {
            document.insert("w", Bson::from(w));
        }
        if let Some(journal) = self.journal {
            document.insert("j", journal);
        }
        if let Some(w_timeout) = self.w_timeout {
            document.insert(
                "wtimeout",
                i64::try_from(w_timeout.as_millis()).unwrap_or(i64::MAX),
            );
        }
        document
    }

    // The command that asks the server for the outcome of the previous legacy write.
    pub(crate) fn get_last_error_command(&self) -> Document {
        let mut command = doc! { "getlasterror": 1 };
        command.extend(self.to_document());
        command
    }
}

#[cfg(test)]
mod test {
    use super::{Acknowledgment, WriteConcern};
    use bson::doc;
    use std::time::Duration;

    #[test]
    fn test_acknowledgement() {
        assert!(WriteConcern::ACKNOWLEDGED.is_acknowledged());
        assert!(WriteConcern::ACKNOWLEDGED.is_server_default());
        assert!(!WriteConcern::UNACKNOWLEDGED.is_acknowledged());
        assert!(WriteConcern::UNACKNOWLEDGED
            .clone()
            .with_journal(true)
            .is_acknowledged());
        assert!(WriteConcern::MAJORITY.is_acknowledged());
    }

    #[test]
    fn test_documents() {
        let wc = WriteConcern::default()
            .with_w(Acknowledgment::Majority)
            .with_journal(true)
            .with_w_timeout(Duration::from_millis(1500));
        assert_eq!(
            wc.to_document(),
            doc! {"w": "majority", "j": true, "wtimeout": 1500_i64}
        );
        assert_eq!(
            WriteConcern::W1.get_last_error_command(),
            doc! {"getlasterror": 1, "w": 1}
        );
    }
}
