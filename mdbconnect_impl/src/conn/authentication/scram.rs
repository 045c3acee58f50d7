use super::{
    crypto_util::{digest, equal_in_constant_time, hmac, md5_hex, salted_password, xor},
    sasl::SaslClient,
};
use crate::{
    conn::{AuthMechanism, Credential},
    MdbResult,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ::hmac::Hmac;
use rand::{thread_rng, RngCore};
use secstr::SecUtf8;
use sha1::Sha1;
use sha2::Sha256;
use std::time::Instant;

const CLIENT_NONCE_LENGTH: usize = 24;
const MIN_ITERATIONS: u32 = 4096;
// no channel binding, no authorization identity
const GS2_HEADER: &str = "n,,";
const CHANNEL_BINDING: &str = "c=biws";

enum ScramState {
    Initial,
    FirstSent { client_first_bare: String },
    FinalSent { server_signature: Vec<u8> },
    Complete,
}

// The hash function a SCRAM variant is built on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScramHash {
    Sha1,
    Sha256,
}
impl ScramHash {
    fn mechanism(self) -> AuthMechanism {
        match self {
            Self::Sha1 => AuthMechanism::ScramSha1,
            Self::Sha256 => AuthMechanism::ScramSha256,
        }
    }

    // SCRAM-SHA-1 works on the hex digest of the legacy password hash, which is
    // never SASLprep'ed; SCRAM-SHA-256 works on the prepared password itself.
    fn password(self, credential: &Credential) -> MdbResult<SecUtf8> {
        match self {
            Self::Sha1 => Ok(SecUtf8::from(md5_hex(
                format!(
                    "{}:mongo:{}",
                    credential.user_name(),
                    credential.password().unsecure()
                )
                .as_bytes(),
            ))),
            Self::Sha256 => {
                let prepared = stringprep::saslprep(credential.password().unsecure())
                    .map_err(|e| usage_err!("password cannot be prepared for SCRAM: {e}"))?;
                Ok(SecUtf8::from(prepared.into_owned()))
            }
        }
    }

    fn salted_password(self, password: &[u8], salt: &[u8], iterations: u32) -> MdbResult<Vec<u8>> {
        match self {
            Self::Sha1 => salted_password::<Hmac<Sha1>>(password, salt, iterations),
            Self::Sha256 => salted_password::<Hmac<Sha256>>(password, salt, iterations),
        }
    }

    fn hmac(self, key: &[u8], data: &[u8]) -> MdbResult<Vec<u8>> {
        match self {
            Self::Sha1 => hmac::<Hmac<Sha1>>(key, data),
            Self::Sha256 => hmac::<Hmac<Sha256>>(key, data),
        }
    }

    fn digest(self, input: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => digest::<Sha1>(input),
            Self::Sha256 => digest::<Sha256>(input),
        }
    }
}

// Client side of SCRAM-SHA-1 and SCRAM-SHA-256 (RFC 5802, RFC 7677).
pub(crate) struct ScramClient {
    hash: ScramHash,
    user_name: String,
    password: SecUtf8,
    client_nonce: String,
    state: ScramState,
}
impl ScramClient {
    pub(crate) fn new(hash: ScramHash, credential: &Credential) -> MdbResult<Self> {
        let mut raw = [0_u8; CLIENT_NONCE_LENGTH];
        thread_rng().fill_bytes(&mut raw);
        Self::with_client_nonce(hash, credential, BASE64.encode(raw))
    }

    fn with_client_nonce(
        hash: ScramHash,
        credential: &Credential,
        client_nonce: String,
    ) -> MdbResult<Self> {
        Ok(Self {
            hash,
            user_name: escape_user_name(credential.user_name()),
            password: hash.password(credential)?,
            client_nonce,
            state: ScramState::Initial,
        })
    }

    fn client_final(
        &self,
        client_first_bare: &str,
        server_first: &str,
    ) -> MdbResult<(String, Vec<u8>)> {
        let fields = ServerFirst::parse(server_first)?;
        if !fields.nonce.starts_with(&self.client_nonce)
            || fields.nonce.len() == self.client_nonce.len()
        {
            return Err(protocol_err!("server nonce does not extend the client nonce"));
        }
        if fields.iterations < MIN_ITERATIONS {
            return Err(protocol_err!(
                "server requests {} iterations, at least {MIN_ITERATIONS} are required",
                fields.iterations
            ));
        }

        let start = Instant::now();
        let salted = self.hash.salted_password(
            self.password.unsecure().as_bytes(),
            &fields.salt,
            fields.iterations,
        )?;
        debug!(
            "pbkdf2 with {} iterations took {} µs",
            fields.iterations,
            Instant::now().duration_since(start).as_micros()
        );

        let without_proof = format!("{CHANNEL_BINDING},r={}", fields.nonce);
        let auth_message = format!("{client_first_bare},{server_first},{without_proof}");

        let client_key = self.hash.hmac(&salted, b"Client Key")?;
        let stored_key = self.hash.digest(&client_key);
        let client_signature = self.hash.hmac(&stored_key, auth_message.as_bytes())?;
        let proof = xor(&client_key, &client_signature)?;

        let server_key = self.hash.hmac(&salted, b"Server Key")?;
        let server_signature = self.hash.hmac(&server_key, auth_message.as_bytes())?;

        Ok((
            format!("{without_proof},p={}", BASE64.encode(proof)),
            server_signature,
        ))
    }
}

impl SaslClient for ScramClient {
    fn mechanism(&self) -> AuthMechanism {
        self.hash.mechanism()
    }

    fn initial_response(&mut self) -> MdbResult<Vec<u8>> {
        let client_first_bare = format!("n={},r={}", self.user_name, self.client_nonce);
        let response = format!("{GS2_HEADER}{client_first_bare}").into_bytes();
        self.state = ScramState::FirstSent { client_first_bare };
        Ok(response)
    }

    fn evaluate_challenge(&mut self, challenge: &[u8]) -> MdbResult<Option<Vec<u8>>> {
        let challenge = std::str::from_utf8(challenge)
            .map_err(|_| protocol_err!("SCRAM challenge is not valid UTF-8"))?;
        match std::mem::replace(&mut self.state, ScramState::Complete) {
            ScramState::FirstSent { client_first_bare } => {
                let (client_final, server_signature) =
                    self.client_final(&client_first_bare, challenge)?;
                self.state = ScramState::FinalSent { server_signature };
                Ok(Some(client_final.into_bytes()))
            }
            ScramState::FinalSent { server_signature } => {
                verify_server_final(challenge, &server_signature)?;
                Ok(Some(Vec::new()))
            }
            ScramState::Initial | ScramState::Complete => {
                Err(impl_err!("unexpected SCRAM challenge"))
            }
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.state, ScramState::Complete)
    }
}

fn verify_server_final(server_final: &str, expected_signature: &[u8]) -> MdbResult<()> {
    if let Some(error) = server_final.strip_prefix("e=") {
        return Err(usage_err!("server rejected the client proof: {error}"));
    }
    let signature = server_final
        .split(',')
        .find_map(|f| f.strip_prefix("v="))
        .ok_or_else(|| protocol_err!("SCRAM server-final message without verifier"))?;
    let signature = BASE64
        .decode(signature)
        .map_err(|_| protocol_err!("SCRAM server signature is not valid base64"))?;
    if equal_in_constant_time(&signature, expected_signature) {
        Ok(())
    } else {
        warn!("Server signature does not match, the server might not know the password");
        Err(usage_err!("server proof failed"))
    }
}

fn escape_user_name(user_name: &str) -> String {
    user_name.replace('=', "=3D").replace(',', "=2C")
}

struct ServerFirst {
    nonce: String,
    salt: Vec<u8>,
    iterations: u32,
}
impl ServerFirst {
    fn parse(message: &str) -> MdbResult<Self> {
        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for field in message.split(',') {
            match field.split_once('=') {
                Some(("r", value)) => nonce = Some(value.to_string()),
                Some(("s", value)) => {
                    salt = Some(
                        BASE64
                            .decode(value)
                            .map_err(|_| protocol_err!("SCRAM salt is not valid base64"))?,
                    );
                }
                Some(("i", value)) => {
                    iterations = Some(value.parse::<u32>().map_err(|_| {
                        protocol_err!("SCRAM iteration count {value} is not a number")
                    })?);
                }
                Some(("m", _)) => {
                    return Err(protocol_err!("unsupported mandatory SCRAM extension"));
                }
                _ => {}
            }
        }
        match (nonce, salt, iterations) {
            (Some(nonce), Some(salt), Some(iterations)) => Ok(Self {
                nonce,
                salt,
                iterations,
            }),
            _ => Err(protocol_err!("incomplete SCRAM server-first message")),
        }
    }
}
