mod authenticator;
mod crypto_util;
mod nonce;
mod plain;
mod sasl;
mod scram;

pub use self::authenticator::Authenticator;

use self::{
    nonce::NonceAuthenticator,
    plain::PlainClient,
    sasl::SaslAuthenticator,
    scram::{ScramClient, ScramHash},
};
use crate::{
    conn::{AuthMechanism, ConnectionDescription, Credential},
    MdbError, MdbResult,
};
#[cfg(feature = "async")]
use crate::conn::AsyncWireConnection;
#[cfg(feature = "sync")]
use crate::conn::WireConnection;
use std::time::Instant;

/// Returns the authenticator for the given credential and server.
///
/// An explicitly requested mechanism wins. Otherwise servers from version 4.0 on get
/// SCRAM-SHA-256, 3.x servers get SCRAM-SHA-1, and older ones the nonce-based
/// MONGODB-CR exchange.
pub fn authenticator_for(
    credential: &Credential,
    description: &ConnectionDescription,
) -> Box<dyn Authenticator> {
    let mechanism = credential.mechanism().unwrap_or_else(|| {
        let version = description.server_version();
        if version.at_least(4, 0) {
            AuthMechanism::ScramSha256
        } else if version.at_least(3, 0) {
            AuthMechanism::ScramSha1
        } else {
            AuthMechanism::MongoCr
        }
    });
    match mechanism {
        AuthMechanism::MongoCr => Box::new(NonceAuthenticator::new(credential.clone())),
        sasl_mechanism => Box::new(SaslAuthenticator::new(credential.clone(), sasl_mechanism)),
    }
}

#[cfg(feature = "sync")]
pub(crate) fn authenticate_sync(
    conn: &mut dyn WireConnection,
    credential: &Credential,
    description: &ConnectionDescription,
) -> MdbResult<()> {
    let start = Instant::now();
    let authenticator = authenticator_for(credential, description);
    trace!(
        "authenticating {} with {}",
        credential.user_name(),
        authenticator.mechanism().name()
    );
    authenticator
        .authenticate_sync(conn, description)
        .map_err(|e| MdbError::authentication(e, credential, authenticator.mechanism()))?;
    debug!(
        "authentication with {} took {} µs",
        authenticator.mechanism().name(),
        Instant::now().duration_since(start).as_micros()
    );
    Ok(())
}

#[cfg(feature = "async")]
pub(crate) async fn authenticate_async(
    conn: &mut dyn AsyncWireConnection,
    credential: &Credential,
    description: &ConnectionDescription,
) -> MdbResult<()> {
    let start = Instant::now();
    let authenticator = authenticator_for(credential, description);
    trace!(
        "authenticating {} with {}",
        credential.user_name(),
        authenticator.mechanism().name()
    );
    authenticator
        .authenticate_async(conn, description)
        .await
        .map_err(|e| MdbError::authentication(e, credential, authenticator.mechanism()))?;
    debug!(
        "authentication with {} took {} µs",
        authenticator.mechanism().name(),
        Instant::now().duration_since(start).as_micros()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{authenticate_async, authenticate_sync, authenticator_for};
    use crate::{
        conn::{
            fake_wire_connection::FakeWireConnection, AuthMechanism, ClusterId,
            ConnectionDescription, ConnectionId, Credential, ServerAddress, ServerId,
            ServerVersion,
        },
        protocol::decode_command,
        MdbError,
    };
    use bson::doc;

    fn description(version: Vec<i32>) -> ConnectionDescription {
        let server_id = ServerId::new(ClusterId::new(), ServerAddress::new("localhost", 27017));
        ConnectionDescription::new(ConnectionId::new(server_id), ServerVersion::new(version))
    }

    #[test]
    fn test_selection_by_server_version() {
        let credential = Credential::new("joe", "secret");
        assert_eq!(
            authenticator_for(&credential, &description(vec![2, 6, 12])).mechanism(),
            AuthMechanism::MongoCr
        );
        assert_eq!(
            authenticator_for(&credential, &description(vec![3, 0, 0])).mechanism(),
            AuthMechanism::ScramSha1
        );
        assert_eq!(
            authenticator_for(&credential, &description(vec![3, 6, 8])).mechanism(),
            AuthMechanism::ScramSha1
        );
        assert_eq!(
            authenticator_for(&credential, &description(vec![4, 0, 0])).mechanism(),
            AuthMechanism::ScramSha256
        );
        assert_eq!(
            authenticator_for(&credential, &description(vec![4, 2])).mechanism(),
            AuthMechanism::ScramSha256
        );
        let plain = credential.with_mechanism(AuthMechanism::Plain);
        assert_eq!(
            authenticator_for(&plain, &description(vec![2, 4])).mechanism(),
            AuthMechanism::Plain
        );
    }

    fn assert_names_credential(error: &MdbError, mechanism: AuthMechanism) {
        match error {
            MdbError::Authentication {
                user,
                source_db,
                mechanism: used,
                ..
            } => {
                assert_eq!(user, "joe");
                assert_eq!(source_db, "reporting");
                assert_eq!(*used, mechanism);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(error.server_code(), Some(18));
    }

    #[test]
    fn test_rejected_credential_is_named_in_error() {
        let credential = Credential::new("joe", "secret").with_source("reporting");
        let mut conn = FakeWireConnection::new(
            description(vec![3, 6, 0]),
            vec![doc! {"ok": 0, "code": 18, "errmsg": "Authentication failed."}],
        );
        let description = description(vec![3, 6, 0]);
        let error = authenticate_sync(&mut conn, &credential, &description).unwrap_err();
        assert_names_credential(&error, AuthMechanism::ScramSha1);

        let start = decode_command(&conn.sent[0].0);
        assert_eq!(start.get_str("mechanism").unwrap(), "SCRAM-SHA-1");
    }

    #[tokio::test]
    async fn test_async_rejected_credential_is_named_in_error() {
        let credential = Credential::new("joe", "secret").with_source("reporting");
        let mut conn = FakeWireConnection::new(
            description(vec![4, 0, 0]),
            vec![doc! {"ok": 0, "code": 18, "errmsg": "Authentication failed."}],
        );
        let description = description(vec![4, 0, 0]);
        let error = authenticate_async(&mut conn, &credential, &description)
            .await
            .unwrap_err();
        assert_names_credential(&error, AuthMechanism::ScramSha256);
    }
}
