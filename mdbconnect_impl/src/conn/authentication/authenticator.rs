use crate::{
    conn::{AuthMechanism, ConnectionDescription},
    MdbResult,
};
#[cfg(feature = "async")]
use crate::conn::AsyncWireConnection;
#[cfg(feature = "sync")]
use crate::conn::WireConnection;
#[cfg(feature = "async")]
use async_trait::async_trait;

/// Authenticates a freshly opened connection.
///
/// Implementations run their exchange on the given connection and fail with the first
/// error; the connection must not be used for anything else in the meantime.
#[cfg_attr(feature = "async", async_trait)]
pub trait Authenticator: std::fmt::Debug + Send + Sync {
    /// The mechanism this authenticator implements.
    fn mechanism(&self) -> AuthMechanism;

    /// Runs the exchange, blocking.
    ///
    /// # Errors
    ///
    /// Any error of the exchange, including the server's rejection.
    #[cfg(feature = "sync")]
    fn authenticate_sync(
        &self,
        conn: &mut dyn WireConnection,
        description: &ConnectionDescription,
    ) -> MdbResult<()>;

    /// Runs the exchange, non-blocking.
    ///
    /// # Errors
    ///
    /// Any error of the exchange, including the server's rejection.
    #[cfg(feature = "async")]
    async fn authenticate_async(
        &self,
        conn: &mut dyn AsyncWireConnection,
        description: &ConnectionDescription,
    ) -> MdbResult<()>;
}
