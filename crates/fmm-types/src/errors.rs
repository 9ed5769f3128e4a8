//! Error types and conversions

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The local callback listener could not be started (e.g. the port is
    /// already in use). Fatal for the attempt; never retried automatically.
    #[error("Could not start callback server: {0}")]
    Startup(String),

    /// The redirect carried a provider error, no authorization code, or a
    /// state value that does not match the in-flight session.
    #[error("Authorization protocol error: {0}")]
    Protocol(String),

    /// Timeout or connection failure while talking to the token or identity
    /// endpoint. Retrying means re-running the flow.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP response from the provider. The status and body are
    /// kept verbatim for diagnosis.
    #[error("Auth server returned HTTP {status}: {body}")]
    AuthServer { status: u16, body: String },

    /// Refresh was rejected with a 4xx. The caller should prompt a full
    /// re-authorization instead of retrying.
    #[error("Token revoked or expired. Please re-authorize.")]
    RevokedToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for String {
    fn from(err: AuthError) -> String {
        err.to_string()
    }
}
