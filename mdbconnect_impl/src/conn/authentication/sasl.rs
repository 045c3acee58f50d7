use super::ScramHash;
use crate::{
    conn::{authentication::Authenticator, AuthMechanism, ConnectionDescription, Credential},
    MdbResult,
};
#[cfg(feature = "async")]
use crate::conn::{run_command_async, AsyncWireConnection};
#[cfg(feature = "sync")]
use crate::conn::{run_command_sync, WireConnection};
#[cfg(feature = "async")]
use async_trait::async_trait;
use bson::{doc, spec::BinarySubtype, Binary, Bson, Document};

// A conversation needs one start and a few continues; more means something is wrong.
const MAX_ROUNDS: usize = 10;

// The client side of a SASL mechanism.
pub(crate) trait SaslClient: Send {
    fn mechanism(&self) -> AuthMechanism;

    fn initial_response(&mut self) -> MdbResult<Vec<u8>>;

    // Returns the response to the server's challenge; `None` if the client has nothing to say.
    fn evaluate_challenge(&mut self, challenge: &[u8]) -> MdbResult<Option<Vec<u8>>>;

    fn is_complete(&self) -> bool;
}

// The state of one SASL exchange.
//
// Each server reply is fed in and yields the next command to send, until the server
// reports that it is done.
struct SaslConversation {
    client: Box<dyn SaslClient>,
    conversation_id: Option<Bson>,
    rounds: usize,
}
impl SaslConversation {
    fn new(client: Box<dyn SaslClient>) -> Self {
        Self {
            client,
            conversation_id: None,
            rounds: 0,
        }
    }

    fn start_command(&mut self) -> MdbResult<Document> {
        let payload = self.client.initial_response()?;
        Ok(doc! {
            "saslStart": 1,
            "mechanism": self.client.mechanism().name(),
            "payload": binary(payload),
            "autoAuthorize": 1,
        })
    }

    fn next_command(&mut self, reply: &Document) -> MdbResult<Option<Document>> {
        if self.conversation_id.is_none() {
            self.conversation_id = Some(
                reply
                    .get("conversationId")
                    .cloned()
                    .ok_or_else(|| protocol_err!("SASL reply without conversationId"))?,
            );
        }
        let done = reply.get_bool("done").unwrap_or(false);
        if done {
            if !self.client.is_complete() {
                // the last server message may arrive together with done
                if let Ok(payload) = reply.get_binary_generic("payload") {
                    if !payload.is_empty() {
                        self.client.evaluate_challenge(payload)?;
                    }
                }
            }
            return if self.client.is_complete() {
                Ok(None)
            } else {
                Err(usage_err!(
                    "server finished the {} conversation before the client was done",
                    self.client.mechanism().name()
                ))
            };
        }

        self.rounds += 1;
        if self.rounds > MAX_ROUNDS {
            return Err(protocol_err!("SASL conversation exceeds {MAX_ROUNDS} rounds"));
        }
        let challenge = reply.get_binary_generic("payload")?;
        let response = self.client.evaluate_challenge(challenge)?.ok_or_else(|| {
            usage_err!(
                "{} produced no response to the server's challenge",
                self.client.mechanism().name()
            )
        })?;
        Ok(Some(doc! {
            "saslContinue": 1,
            "conversationId": self.conversation_id.clone().unwrap_or(Bson::Null),
            "payload": binary(response),
        }))
    }
}

fn binary(bytes: Vec<u8>) -> Bson {
    Bson::Binary(Binary {
        subtype: BinarySubtype::Generic,
        bytes,
    })
}

// Runs a SASL mechanism with `saslStart` and `saslContinue` commands.
#[derive(Debug)]
pub(crate) struct SaslAuthenticator {
    credential: Credential,
    mechanism: AuthMechanism,
}
impl SaslAuthenticator {
    pub(crate) fn new(credential: Credential, mechanism: AuthMechanism) -> Self {
        Self {
            credential,
            mechanism,
        }
    }

    fn conversation(&self) -> MdbResult<SaslConversation> {
        let client: Box<dyn SaslClient> = match self.mechanism {
            AuthMechanism::ScramSha1 => {
                Box::new(super::ScramClient::new(ScramHash::Sha1, &self.credential)?)
            }
            AuthMechanism::ScramSha256 => {
                Box::new(super::ScramClient::new(ScramHash::Sha256, &self.credential)?)
            }
            AuthMechanism::Plain => Box::new(super::PlainClient::new(&self.credential)),
            AuthMechanism::MongoCr => {
                return Err(impl_err!("MONGODB-CR is not a SASL mechanism"));
            }
        };
        Ok(SaslConversation::new(client))
    }
}

#[cfg_attr(feature = "async", async_trait)]
impl Authenticator for SaslAuthenticator {
    fn mechanism(&self) -> AuthMechanism {
        self.mechanism
    }

    #[cfg(feature = "sync")]
    fn authenticate_sync(
        &self,
        conn: &mut dyn WireConnection,
        _description: &ConnectionDescription,
    ) -> MdbResult<()> {
        let source = self.credential.source();
        let mut conversation = self.conversation()?;
        let mut command = conversation.start_command()?;
        loop {
            let reply = run_command_sync(conn, source, command)?;
            match conversation.next_command(&reply)? {
                Some(next) => command = next,
                None => return Ok(()),
            }
        }
    }

    #[cfg(feature = "async")]
    async fn authenticate_async(
        &self,
        conn: &mut dyn AsyncWireConnection,
        _description: &ConnectionDescription,
    ) -> MdbResult<()> {
        let source = self.credential.source();
        let mut conversation = self.conversation()?;
        let mut command = conversation.start_command()?;
        loop {
            let reply = run_command_async(conn, source, command).await?;
            match conversation.next_command(&reply)? {
                Some(next) => command = next,
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{binary, SaslClient, SaslConversation};
    use crate::{conn::AuthMechanism, MdbResult};
    use bson::doc;

    // Needs two challenges, then is complete.
    struct TwoStepClient {
        steps: usize,
        answer_second: bool,
    }
    impl SaslClient for TwoStepClient {
        fn mechanism(&self) -> AuthMechanism {
            AuthMechanism::ScramSha256
        }
        fn initial_response(&mut self) -> MdbResult<Vec<u8>> {
            Ok(b"hello".to_vec())
        }
        fn evaluate_challenge(&mut self, _challenge: &[u8]) -> MdbResult<Option<Vec<u8>>> {
            self.steps += 1;
            if self.steps == 2 && !self.answer_second {
                return Ok(None);
            }
            Ok(Some(vec![u8::try_from(self.steps).unwrap()]))
        }
        fn is_complete(&self) -> bool {
            self.steps >= 2
        }
    }

    #[test]
    fn test_conversation_rounds() {
        let mut conv = SaslConversation::new(Box::new(TwoStepClient {
            steps: 0,
            answer_second: true,
        }));
        let start = conv.start_command().unwrap();
        assert_eq!(start.get_str("mechanism").unwrap(), "SCRAM-SHA-256");

        let reply = doc! {"conversationId": 1, "done": false, "payload": binary(vec![0])};
        let next = conv.next_command(&reply).unwrap().unwrap();
        assert_eq!(next.get_i32("conversationId").unwrap(), 1);
        assert_eq!(next.get_binary_generic("payload").unwrap(), &vec![1]);

        let next = conv.next_command(&reply).unwrap().unwrap();
        assert_eq!(next.get_binary_generic("payload").unwrap(), &vec![2]);

        let done = doc! {"conversationId": 1, "done": true, "payload": binary(vec![])};
        assert!(conv.next_command(&done).unwrap().is_none());
    }

    #[test]
    fn test_missing_response_is_fatal() {
        let mut conv = SaslConversation::new(Box::new(TwoStepClient {
            steps: 0,
            answer_second: false,
        }));
        conv.start_command().unwrap();
        let reply = doc! {"conversationId": 1, "done": false, "payload": binary(vec![0])};
        conv.next_command(&reply).unwrap();
        assert!(conv.next_command(&reply).is_err());
    }

    #[test]
    fn test_early_done_is_fatal() {
        let mut conv = SaslConversation::new(Box::new(TwoStepClient {
            steps: 0,
            answer_second: true,
        }));
        conv.start_command().unwrap();
        let done = doc! {"conversationId": 1, "done": true, "payload": binary(vec![])};
        assert!(conv.next_command(&done).is_err());
    }

    #[test]
    fn test_rounds_are_bounded() {
        struct Endless;
        impl SaslClient for Endless {
            fn mechanism(&self) -> AuthMechanism {
                AuthMechanism::Plain
            }
            fn initial_response(&mut self) -> MdbResult<Vec<u8>> {
                Ok(vec![])
            }
            fn evaluate_challenge(&mut self, _: &[u8]) -> MdbResult<Option<Vec<u8>>> {
                Ok(Some(vec![]))
            }
            fn is_complete(&self) -> bool {
                false
            }
        }
        let mut conv = SaslConversation::new(Box::new(Endless));
        conv.start_command().unwrap();
        let reply = doc! {"conversationId": 1, "done": false, "payload": binary(vec![])};
        let mut result = Ok(None);
        for _ in 0..=super::MAX_ROUNDS {
            result = conv.next_command(&reply);
            if result.is_err() {
                break;
            }
        }
        assert!(result.is_err());
    }
}
