//! Nexus Mods authentication for FromSoft Mod Manager
//!
//! Implements the two ways a user can connect their Nexus Mods account:
//!
//! - OAuth 2.0 Authorization Code Flow with PKCE (S256), using a temporary
//!   localhost server to capture the browser redirect
//! - Manual personal API key, validated against the Nexus identity endpoint
//!
//! # Usage Example
//! ```no_run
//! use fmm_auth::{AuthConfig, OAuthSession, SessionResult};
//!
//! # async fn run() -> fmm_types::AuthResult<()> {
//! let session = OAuthSession::new(AuthConfig::default());
//! let start = session.start().await?;
//! // The system browser has been opened to start.auth_url.
//! // Poll periodically (e.g. every 500 ms):
//! loop {
//!     match session.poll() {
//!         SessionResult::Success(handoff) => { /* store handoff.tokens */ break; }
//!         SessionResult::Failed { message } => { /* show message */ break; }
//!         _ => tokio::time::sleep(std::time::Duration::from_millis(500)).await,
//!     }
//! }
//! session.stop();
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod claims;
pub mod config;
pub mod identity;
pub mod manual;
pub mod pkce;
pub mod session;
pub mod token_client;
pub mod types;

pub use callback::CallbackServer;
pub use claims::{decode_claims, extract_user_identity};
pub use config::AuthConfig;
pub use identity::{ApiAuth, IdentityClient};
pub use manual::{KeyCaptureServer, ManualKeySession};
pub use pkce::{generate_challenge, generate_state, generate_verifier, PkceChallenge};
pub use session::OAuthSession;
pub use token_client::TokenClient;
pub use types::{
    AuthHandoff, CallbackResult, SessionResult, SessionStart, TokenSet, UserIdentity,
};
