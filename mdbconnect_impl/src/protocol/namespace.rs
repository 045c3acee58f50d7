use crate::{MdbError, MdbResult};

/// Database and collection name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace {
    database: String,
    collection: String,
}
impl Namespace {
    /// Constructor.
    ///
    /// # Errors
    ///
    /// `MdbError::Usage` if one of the names is empty or contains a null byte,
    /// or if the database name contains a dot.
    pub fn new<D: Into<String>, C: Into<String>>(database: D, collection: C) -> MdbResult<Self> {
        let database = database.into();
        let collection = collection.into();
        if database.is_empty() || database.contains(['.', '\0']) {
            return Err(usage_err!("invalid database name {database:?}"));
        }
        if collection.is_empty() || collection.contains('\0') {
            return Err(usage_err!("invalid collection name {collection:?}"));
        }
        Ok(Self {
            database,
            collection,
        })
    }

    // The pseudo collection that commands are sent to.
    pub(crate) fn command_collection(database: &str) -> MdbResult<Self> {
        Self::new(database, "$cmd")
    }

    /// The database name.
    pub fn database(&self) -> &str {
        &self.database
    }
    /// The collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }
    /// `database.collection`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}
impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}
impl std::str::FromStr for Namespace {
    type Err = MdbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((database, collection)) => Self::new(database, collection),
            None => Err(usage_err!("namespace {s:?} has no collection part")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Namespace;

    #[test]
    fn test_namespace() {
        let ns: Namespace = "test.people.archive".parse().unwrap();
        assert_eq!(ns.database(), "test");
        assert_eq!(ns.collection(), "people.archive");
        assert_eq!(ns.full_name(), "test.people.archive");
        assert_eq!(Namespace::command_collection("admin").unwrap().to_string(), "admin.$cmd");
        assert!(Namespace::new("a.b", "c").is_err());
        assert!(Namespace::new("a", "").is_err());
        assert!("nodot".parse::<Namespace>().is_err());
    }
}
