//! Manual personal-key fallback
//!
//! The user fetches a personal API key from the Nexus account page (opened by
//! the application) and pastes it in. Validation is a single identity
//! request; no PKCE, state, or fixed-port machinery is involved, but the
//! session exposes the same identity and error contract as the OAuth path so
//! callers need not branch on the auth mode.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::AuthConfig;
use crate::identity::{ApiAuth, IdentityClient};
use crate::types::UserIdentity;
use fmm_types::{AuthError, AuthResult};

/// Manual-key authentication session
pub struct ManualKeySession {
    config: AuthConfig,
    identity: IdentityClient,
}

impl ManualKeySession {
    /// Create a session with the given configuration
    pub fn new(config: AuthConfig) -> Self {
        let identity = IdentityClient::new(&config);
        Self { config, identity }
    }

    /// Open the provider's personal API key page in the system browser
    ///
    /// Returns the page URL so callers can also show it as a link.
    pub fn open_key_page(&self) -> String {
        if self.config.open_browser {
            if let Err(e) = open::that(&self.config.api_key_page) {
                warn!("Could not open the system browser: {}", e);
            }
        }
        self.config.api_key_page.clone()
    }

    /// Validate a pasted key with one "who am I" request
    pub async fn validate(&self, key: &str) -> AuthResult<UserIdentity> {
        let identity = self
            .identity
            .validate(&ApiAuth::ApiKey(key.to_string()))
            .await?;
        info!("Personal key validated for {}", identity.name);
        Ok(identity)
    }
}

/// Query parameters of a key-delivery redirect
#[derive(Debug, Deserialize)]
struct KeyQuery {
    api_key: Option<String>,
}

/// Ephemeral-port listener that captures an `api_key` redirect parameter
///
/// Unlike the OAuth callback server this binds port 0 and lets the OS pick;
/// the chosen port is reported by [`port`](Self::port) for embedding in the
/// provider URL. The first key received wins.
pub struct KeyCaptureServer {
    port: u16,
    captured: Arc<Mutex<Option<String>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl KeyCaptureServer {
    /// Bind on an ephemeral loopback port
    pub async fn bind() -> AuthResult<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| AuthError::Startup(format!("could not bind key capture server: {}", e)))?;
        let port = listener.local_addr()?.port();

        let captured: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        // The provider redirect may land on any path; capture them all.
        let app = Router::new()
            .fallback(capture_key)
            .with_state(Arc::clone(&captured));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!("Key capture server error: {}", e);
            }
        });

        info!("Key capture server listening on 127.0.0.1:{}", port);

        Ok(Self {
            port,
            captured,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// The ephemeral port chosen by the OS
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Non-blocking check for a captured key
    pub fn poll_key(&self) -> Option<String> {
        self.captured.lock().clone()
    }

    /// Shut the listener down and release the port. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            debug!("Key capture server stopped");
        }
    }
}

impl Drop for KeyCaptureServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn capture_key(
    State(captured): State<Arc<Mutex<Option<String>>>>,
    Query(params): Query<KeyQuery>,
) -> axum::response::Response {
    match params.api_key {
        Some(key) if !key.is_empty() => {
            let mut slot = captured.lock();
            if slot.is_none() {
                *slot = Some(key);
            }
            Html(
                "<html><body style='font-family:sans-serif;text-align:center;\
                 padding:60px;background:#1a1a2e;color:#e0e0ec;'>\
                 <h2>API Key Received!</h2>\
                 <p>You can close this tab and return to the app.</p>\
                 </body></html>",
            )
            .into_response()
        }
        _ => (axum::http::StatusCode::BAD_REQUEST, "No API key received.").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_key_capture_server_binds_ephemeral_port() {
        let server = KeyCaptureServer::bind().await.unwrap();
        assert_ne!(server.port(), 0);
        assert_eq!(server.poll_key(), None);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut server = KeyCaptureServer::bind().await.unwrap();
        server.stop();
        server.stop();
    }

    #[test]
    fn test_open_key_page_returns_url_without_browser() {
        let session = ManualKeySession::new(AuthConfig {
            open_browser: false,
            ..AuthConfig::default()
        });
        let url = session.open_key_page();
        assert!(url.contains("nexusmods.com"));
    }
}
