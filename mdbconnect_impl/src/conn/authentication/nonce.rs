use super::{crypto_util::md5_hex, Authenticator};
use crate::{
    conn::{AuthMechanism, ConnectionDescription, Credential},
    MdbResult,
};
#[cfg(feature = "async")]
use crate::conn::{run_command_async, AsyncWireConnection};
#[cfg(feature = "sync")]
use crate::conn::{run_command_sync, WireConnection};
#[cfg(feature = "async")]
use async_trait::async_trait;
use bson::{doc, Document};

// MONGODB-CR: challenge-response with a server nonce, for servers before 3.0.
#[derive(Debug)]
pub(crate) struct NonceAuthenticator {
    credential: Credential,
}
impl NonceAuthenticator {
    pub(crate) fn new(credential: Credential) -> Self {
        Self { credential }
    }

    fn authenticate_command(&self, nonce_reply: &Document) -> MdbResult<Document> {
        let nonce = nonce_reply.get_str("nonce")?;
        let user_name = self.credential.user_name();
        Ok(doc! {
            "authenticate": 1,
            "user": user_name,
            "nonce": nonce,
            "key": nonce_key(user_name, self.credential.password().unsecure(), nonce),
        })
    }
}

fn nonce_key(user_name: &str, password: &str, nonce: &str) -> String {
    let password_digest = md5_hex(format!("{user_name}:mongo:{password}").as_bytes());
    md5_hex(format!("{nonce}{user_name}{password_digest}").as_bytes())
}

#[cfg_attr(feature = "async", async_trait)]
impl Authenticator for NonceAuthenticator {
    fn mechanism(&self) -> AuthMechanism {
        AuthMechanism::MongoCr
    }

    #[cfg(feature = "sync")]
    fn authenticate_sync(
        &self,
        conn: &mut dyn WireConnection,
        _description: &ConnectionDescription,
    ) -> MdbResult<()> {
        let source = self.credential.source();
        let nonce_reply = run_command_sync(conn, source, doc! {"getnonce": 1})?;
        run_command_sync(conn, source, self.authenticate_command(&nonce_reply)?)?;
        Ok(())
    }

    #[cfg(feature = "async")]
    async fn authenticate_async(
        &self,
        conn: &mut dyn AsyncWireConnection,
        _description: &ConnectionDescription,
    ) -> MdbResult<()> {
        let source = self.credential.source();
        let nonce_reply = run_command_async(conn, source, doc! {"getnonce": 1}).await?;
        let command = self.authenticate_command(&nonce_reply)?;
        run_command_async(conn, source, command).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{nonce_key, NonceAuthenticator};
    use crate::conn::{authentication::crypto_util::md5_hex, Credential};
    use bson::doc;

    #[test]
    fn test_key() {
        let digest = md5_hex(b"joe:mongo:secret");
        assert_eq!(
            nonce_key("joe", "secret", "2375531c32080ae8"),
            md5_hex(format!("2375531c32080ae8joe{digest}").as_bytes())
        );

        let auth = NonceAuthenticator::new(Credential::new("joe", "secret"));
        let cmd = auth
            .authenticate_command(&doc! {"nonce": "2375531c32080ae8", "ok": 1})
            .unwrap();
        assert_eq!(cmd.get_str("user").unwrap(), "joe");
        assert_eq!(cmd.get_str("nonce").unwrap(), "2375531c32080ae8");
        assert_eq!(cmd.get_str("key").unwrap().len(), 32);
        assert!(auth.authenticate_command(&doc! {"ok": 1}).is_err());
    }
}
