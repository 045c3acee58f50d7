use bson::{doc, Document};
use std::borrow::Cow;

/// The kind of a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteKind {
    /// Insert documents.
    Insert,
    /// Update documents.
    Update,
    /// Delete documents.
    Delete,
}
impl WriteKind {
    pub(crate) fn command_name(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub(crate) fn items_field(self) -> &'static str {
        match self {
            Self::Insert => "documents",
            Self::Update => "updates",
            Self::Delete => "deletes",
        }
    }
}

/// A single item of a write.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteRequest {
    /// Insert a document.
    Insert {
        /// The document to insert.
        document: Document,
    },
    /// Update the documents that match the filter.
    Update {
        /// Selects the documents.
        filter: Document,
        /// The modifications, or a replacement document.
        update: Document,
        /// Insert a document if none matches.
        upsert: bool,
        /// Update all matching documents rather than only the first.
        multi: bool,
    },
    /// Delete the documents that match the filter.
    Delete {
        /// Selects the documents.
        filter: Document,
        /// Delete all matching documents rather than only the first.
        multi: bool,
    },
}
impl WriteRequest {
    /// Inserts a document.
    pub fn insert(document: Document) -> Self {
        Self::Insert { document }
    }
    /// Updates the first matching document.
    pub fn update_one(filter: Document, update: Document) -> Self {
        Self::Update {
            filter,
            update,
            upsert: false,
            multi: false,
        }
    }
    /// Updates all matching documents.
    pub fn update_many(filter: Document, update: Document) -> Self {
        Self::Update {
            filter,
            update,
            upsert: false,
            multi: true,
        }
    }
    /// Replaces the first matching document, or inserts the replacement if none matches.
    pub fn upsert_one(filter: Document, replacement: Document) -> Self {
        Self::Update {
            filter,
            update: replacement,
            upsert: true,
            multi: false,
        }
    }
    /// Deletes the first matching document.
    pub fn delete_one(filter: Document) -> Self {
        Self::Delete {
            filter,
            multi: false,
        }
    }
    /// Deletes all matching documents.
    pub fn delete_many(filter: Document) -> Self {
        Self::Delete {
            filter,
            multi: true,
        }
    }

    /// The kind of this request.
    pub fn kind(&self) -> WriteKind {
        match self {
            Self::Insert { .. } => WriteKind::Insert,
            Self::Update { .. } => WriteKind::Update,
            Self::Delete { .. } => WriteKind::Delete,
        }
    }

    // The array element of a write command that represents this request.
    pub(crate) fn to_command_item(&self) -> Cow<'_, Document> {
        match self {
            Self::Insert { document } => Cow::Borrowed(document),
            Self::Update {
                filter,
                update,
                upsert,
                multi,
            } => {
                let (upsert, multi) = (*upsert, *multi);
                Cow::Owned(doc! {
                    "q": filter.clone(),
                    "u": update.clone(),
                    "upsert": upsert,
                    "multi": multi,
                })
            }
            Self::Delete { filter, multi } => {
                let limit: i32 = if *multi { 0 } else { 1 };
                Cow::Owned(doc! { "q": filter.clone(), "limit": limit })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{WriteKind, WriteRequest};
    use bson::doc;

    #[test]
    fn test_command_items() {
        let update = WriteRequest::update_many(doc! {"a": 1}, doc! {"$set": {"b": 2}});
        assert_eq!(update.kind(), WriteKind::Update);
        assert_eq!(
            update.to_command_item().into_owned(),
            doc! {"q": {"a": 1}, "u": {"$set": {"b": 2}}, "upsert": false, "multi": true}
        );
        let delete = WriteRequest::delete_one(doc! {"a": 1});
        assert_eq!(
            delete.to_command_item().into_owned(),
            doc! {"q": {"a": 1}, "limit": 1}
        );
        assert_eq!(WriteKind::Delete.items_field(), "deletes");
    }
}
