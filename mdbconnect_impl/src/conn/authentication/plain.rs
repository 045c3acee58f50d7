use super::sasl::SaslClient;
use crate::{
    conn::{AuthMechanism, Credential},
    MdbResult,
};
use secstr::SecUtf8;

// PLAIN (RFC 4616): the password is sent in clear text, so the transport must be protected.
pub(crate) struct PlainClient {
    user_name: String,
    password: SecUtf8,
    sent: bool,
}
impl PlainClient {
    pub(crate) fn new(credential: &Credential) -> Self {
        Self {
            user_name: credential.user_name().to_string(),
            password: credential.password().clone(),
            sent: false,
        }
    }
}

impl SaslClient for PlainClient {
    fn mechanism(&self) -> AuthMechanism {
        AuthMechanism::Plain
    }

    fn initial_response(&mut self) -> MdbResult<Vec<u8>> {
        let mut response = Vec::with_capacity(2 + self.user_name.len() + self.password.unsecure().len());
        response.push(0);
        response.extend_from_slice(self.user_name.as_bytes());
        response.push(0);
        response.extend_from_slice(self.password.unsecure().as_bytes());
        self.sent = true;
        Ok(response)
    }

    fn evaluate_challenge(&mut self, _challenge: &[u8]) -> MdbResult<Option<Vec<u8>>> {
        Err(protocol_err!("PLAIN does not expect a server challenge"))
    }

    fn is_complete(&self) -> bool {
        self.sent
    }
}
