//! Local OAuth callback server
//!
//! A short-lived, single-client HTTP server on the loopback interface that
//! captures the browser redirect for one authorization attempt. The server
//! records at most one terminal outcome (code or error); anything arriving
//! after that gets a neutral page and changes nothing. No request logging is
//! emitted.

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::types::CallbackResult;
use fmm_types::{AuthError, AuthResult};

/// Query parameters of the OAuth redirect
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Shared state for the callback route
struct RouteState {
    /// Expected CSRF state, fixed for the lifetime of the server
    expected_state: String,

    /// Single-use channel for the terminal outcome; taken by the first
    /// terminal callback
    result_tx: Mutex<Option<oneshot::Sender<AuthResult<CallbackResult>>>>,
}

/// Handle to a running callback server
///
/// Dropping the handle (or calling [`shutdown`](Self::shutdown)) releases
/// the port.
pub struct CallbackServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl CallbackServer {
    /// Bind the callback server on the loopback interface
    ///
    /// Returns the server handle and the receiver for the terminal outcome.
    /// A bind failure (typically the port being in use by another instance
    /// or an abandoned flow) is fatal for this attempt and is not retried.
    pub async fn bind(
        port: u16,
        path: &str,
        expected_state: String,
    ) -> AuthResult<(Self, oneshot::Receiver<AuthResult<CallbackResult>>)> {
        let addr = format!("127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            AuthError::Startup(format!(
                "could not bind callback server on port {}: {}",
                port, e
            ))
        })?;

        let (result_tx, result_rx) = oneshot::channel();
        let route_state = Arc::new(RouteState {
            expected_state,
            result_tx: Mutex::new(Some(result_tx)),
        });

        // One recognized route; axum's fallback answers 404 for the rest.
        let app = Router::new()
            .route(path, get(handle_callback))
            .with_state(route_state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!("Callback server error: {}", e);
            }
        });

        info!("Callback server listening on http://{}{}", addr, path);

        Ok((
            Self {
                shutdown_tx: Some(shutdown_tx),
            },
            result_rx,
        ))
    }

    /// Signal the server to shut down and release the port
    ///
    /// Idempotent; safe to call any number of times.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            debug!("Callback server shutdown signalled");
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Resolve one redirect into a terminal outcome
///
/// Precedence: provider `error` first (even alongside a code), then a
/// missing code, then a state mismatch (the code is discarded), then
/// success. The browser always receives a 200 HTML page so the tab never
/// shows a network error.
async fn handle_callback(
    State(route): State<Arc<RouteState>>,
    Query(params): Query<CallbackQuery>,
) -> Html<String> {
    let outcome = if let Some(error) = params.error {
        Err(AuthError::Protocol(format!(
            "authorization failed: {}",
            error
        )))
    } else {
        match params.code {
            None => Err(AuthError::Protocol(
                "no authorization code received".to_string(),
            )),
            Some(_) if params.state.as_deref() != Some(route.expected_state.as_str()) => {
                warn!("Callback state does not match this session");
                Err(AuthError::Protocol(
                    "state mismatch (possible CSRF attack)".to_string(),
                ))
            }
            Some(code) => Ok(CallbackResult {
                code,
                state: route.expected_state.clone(),
            }),
        }
    };

    let page = match &outcome {
        Ok(_) => success_page(),
        Err(e) => failure_page(&e.to_string()),
    };

    match route.result_tx.lock().take() {
        Some(sender) => {
            if sender.send(outcome).is_err() {
                error!("Callback outcome receiver dropped before delivery");
            }
        }
        None => {
            // A terminal outcome was already recorded; this request changes
            // nothing.
            warn!("Callback received after the flow already completed");
            return Html(completed_page());
        }
    }

    Html(page)
}

fn page(heading: &str, detail: &str) -> String {
    format!(
        "<html><body style='font-family:sans-serif;text-align:center;\
         padding:60px;background:#1a1a2e;color:#e0e0ec;'>\
         <h2>{}</h2><p>{}</p></body></html>",
        heading, detail
    )
}

fn success_page() -> String {
    page(
        "Authorization successful!",
        "You can close this tab and return to FromSoft Mod Manager.",
    )
}

fn failure_page(detail: &str) -> String {
    page("Authorization failed", detail)
}

fn completed_page() -> String {
    page(
        "Authorization already completed",
        "You can close this tab and return to FromSoft Mod Manager.",
    )
}
