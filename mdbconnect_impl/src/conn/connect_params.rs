use crate::conn::{ServerAddress, StreamFactory, TcpStreamFactory};
use secstr::SecUtf8;
use std::sync::Arc;

/// The authentication mechanisms the driver supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMechanism {
    /// Salted challenge-response with SHA-1 over the legacy password digest, via SASL.
    ScramSha1,
    /// Salted challenge-response with SHA-256, negotiated via SASL.
    ScramSha256,
    /// Plain text user and password via SASL; only sensible over an encrypted transport.
    Plain,
    /// The legacy nonce-based challenge-response of old servers.
    MongoCr,
}
impl AuthMechanism {
    /// The name of the mechanism on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::ScramSha1 => "SCRAM-SHA-1",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::Plain => "PLAIN",
            Self::MongoCr => "MONGODB-CR",
        }
    }
}

/// User, password and the database that holds the user's definition.
#[derive(Clone)]
pub struct Credential {
    mechanism: Option<AuthMechanism>,
    user_name: String,
    source: String,
    password: SecUtf8,
}
impl Credential {
    /// The database users are defined in if nothing else is specified.
    pub const DEFAULT_SOURCE: &'static str = "admin";

    /// Constructor; the mechanism is chosen based on the server version.
    pub fn new<U: Into<String>, P: AsRef<str>>(user_name: U, password: P) -> Self {
        Self {
            mechanism: None,
            user_name: user_name.into(),
            source: Self::DEFAULT_SOURCE.to_string(),
            password: SecUtf8::from(password.as_ref()),
        }
    }

    /// Builder-method for choosing the mechanism explicitly.
    #[must_use]
    pub fn with_mechanism(mut self, mechanism: AuthMechanism) -> Self {
        if mechanism == AuthMechanism::Plain && self.source == Self::DEFAULT_SOURCE {
            self.source = "$external".to_string();
        }
        self.mechanism = Some(mechanism);
        self
    }

    /// Builder-method for setting the database that holds the user's definition.
    #[must_use]
    pub fn with_source<S: Into<String>>(mut self, source: S) -> Self {
        self.source = source.into();
        self
    }

    /// The explicitly chosen mechanism, if any.
    pub fn mechanism(&self) -> Option<AuthMechanism> {
        self.mechanism
    }
    /// The user name.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }
    /// The database that holds the user's definition.
    pub fn source(&self) -> &str {
        &self.source
    }
    pub(crate) fn password(&self) -> &SecUtf8 {
        &self.password
    }
}
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("mechanism", &self.mechanism)
            .field("user_name", &self.user_name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// An immutable struct with all information necessary to open a new connection
/// to a server.
#[derive(Clone, Debug)]
pub struct ConnectParams {
    address: ServerAddress,
    credential: Option<Credential>,
    application_name: Option<String>,
    stream_factory: Arc<dyn StreamFactory>,
}
impl ConnectParams {
    /// Constructor for a connection without authentication over plain TCP.
    pub fn new(address: ServerAddress) -> Self {
        Self {
            address,
            credential: None,
            application_name: None,
            stream_factory: Arc::new(TcpStreamFactory),
        }
    }

    /// Builder-method for adding a credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Builder-method for the application name that is reported to the server.
    #[must_use]
    pub fn with_application_name<S: Into<String>>(mut self, name: S) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Builder-method for replacing the transport, e.g. with one that uses TLS.
    #[must_use]
    pub fn with_stream_factory(mut self, stream_factory: Arc<dyn StreamFactory>) -> Self {
        self.stream_factory = stream_factory;
        self
    }

    /// The server address.
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }
    /// The credential, if any.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
    /// The application name, if any.
    pub fn application_name(&self) -> Option<&str> {
        self.application_name.as_deref()
    }
    pub(crate) fn stream_factory(&self) -> &Arc<dyn StreamFactory> {
        &self.stream_factory
    }
}
