//! OAuth authorization session state machine
//!
//! One `OAuthSession` coordinates one authorization attempt: PKCE and state
//! generation, the local callback server, the system browser, and the code
//! exchange. The caller drives it with `start()`, observes it with
//! non-blocking `poll()` calls (every 500 ms works well), and releases it
//! with `stop()`.
//!
//! All blocking work happens on a background task. The task writes the
//! terminal outcome exactly once into a single result cell; `poll()` only
//! reads that cell, and the first poll that sees a success moves the tokens
//! out to the caller.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::callback::CallbackServer;
use crate::claims::extract_user_identity;
use crate::config::AuthConfig;
use crate::pkce::{generate_state, PkceChallenge};
use crate::token_client::TokenClient;
use crate::types::{AuthHandoff, CallbackResult, SessionResult, SessionStart};
use fmm_types::{AuthError, AuthResult};

/// Session phase, advanced by `start()`, the worker, and `stop()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Waiting,
    Exchanging,
    Completed,
    Stopped,
}

/// Terminal outcome cell. Written once, by the worker (or by `start()` on a
/// bind failure).
enum Terminal {
    None,
    Failed(String),
    /// `Some` until a poll delivers the handoff
    Succeeded(Option<AuthHandoff>),
}

struct SessionState {
    phase: Phase,
    terminal: Terminal,
    stop_tx: Option<oneshot::Sender<()>>,
    server: Option<CallbackServer>,
}

/// OAuth 2.0 PKCE session against the Nexus authorization server
pub struct OAuthSession {
    config: AuthConfig,
    state: Arc<Mutex<SessionState>>,
}

impl OAuthSession {
    /// Create an idle session with the given configuration
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SessionState {
                phase: Phase::Idle,
                terminal: Terminal::None,
                stop_tx: None,
                server: None,
            })),
        }
    }

    /// Start the authorization flow
    ///
    /// Generates fresh PKCE parameters and a CSRF state, binds the callback
    /// server, spawns the background worker, and opens the authorize URL in
    /// the system browser (unless suppressed by the configuration).
    ///
    /// A bind failure moves the session straight to a terminal failure and
    /// the browser is never opened. Only one authorization may be pending
    /// per session; a second `start()` while one is in flight is rejected.
    pub async fn start(&self) -> AuthResult<SessionStart> {
        {
            let mut state = self.state.lock();
            if matches!(state.phase, Phase::Waiting | Phase::Exchanging) {
                return Err(AuthError::Protocol(
                    "an authorization attempt is already in progress".to_string(),
                ));
            }
            state.phase = Phase::Idle;
            state.terminal = Terminal::None;
            state.stop_tx = None;
            state.server = None;
        }

        let pkce = PkceChallenge::generate();
        let csrf_state = generate_state();

        info!("Starting Nexus authorization flow");

        let (server, result_rx) = match CallbackServer::bind(
            self.config.callback_port,
            &self.config.callback_path,
            csrf_state.clone(),
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                let mut state = self.state.lock();
                state.phase = Phase::Completed;
                state.terminal = Terminal::Failed(e.to_string());
                return Err(e);
            }
        };

        let auth_url = self.build_authorize_url(&pkce.code_challenge, &csrf_state);
        let (stop_tx, stop_rx) = oneshot::channel();

        {
            let mut state = self.state.lock();
            state.phase = Phase::Waiting;
            state.stop_tx = Some(stop_tx);
            state.server = Some(server);
        }

        tokio::spawn(run_worker(
            Arc::clone(&self.state),
            result_rx,
            stop_rx,
            TokenClient::new(self.config.clone()),
            pkce.code_verifier,
            self.config.flow_timeout,
        ));

        if self.config.open_browser {
            if let Err(e) = open::that(&auth_url) {
                warn!("Could not open the system browser: {}", e);
            }
        }

        Ok(SessionStart {
            auth_url,
            redirect_uri: self.config.redirect_uri(),
            state: csrf_state,
        })
    }

    /// Non-blocking snapshot of the session
    ///
    /// The first poll that observes a terminal success receives the
    /// [`AuthHandoff`]; the session keeps no reference to the tokens after
    /// that, and later polls report [`SessionResult::Completed`]. Terminal
    /// failures keep being reported on every poll.
    pub fn poll(&self) -> SessionResult {
        let mut state = self.state.lock();
        match state.phase {
            Phase::Idle => SessionResult::Idle,
            Phase::Waiting => SessionResult::Pending,
            Phase::Exchanging => SessionResult::Exchanging,
            Phase::Stopped => SessionResult::Stopped,
            Phase::Completed => match &mut state.terminal {
                Terminal::Failed(message) => SessionResult::Failed {
                    message: message.clone(),
                },
                Terminal::Succeeded(handoff) => match handoff.take() {
                    Some(handoff) => SessionResult::Success(handoff),
                    None => SessionResult::Completed,
                },
                Terminal::None => SessionResult::Completed,
            },
        }
    }

    /// Stop the session, signalling the worker and releasing the port
    ///
    /// Idempotent: safe before `start()`, after completion, and when called
    /// repeatedly. A completed session keeps reporting its terminal result.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(tx) = state.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(server) = state.server.as_mut() {
            server.shutdown();
        }
        state.server = None;
        if state.phase != Phase::Completed {
            state.phase = Phase::Stopped;
        }
        debug!("Authorization session stopped");
    }

    /// Build the authorize URL carrying the PKCE challenge and CSRF state
    fn build_authorize_url(&self, code_challenge: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&response_type=code&scope={}&redirect_uri={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.scope()),
            urlencoding::encode(&self.config.redirect_uri()),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }
}

/// Background worker: waits for the single callback outcome, performs the
/// exchange, and writes the terminal result
async fn run_worker(
    state: Arc<Mutex<SessionState>>,
    result_rx: oneshot::Receiver<AuthResult<CallbackResult>>,
    stop_rx: oneshot::Receiver<()>,
    token_client: TokenClient,
    code_verifier: String,
    flow_timeout: Option<Duration>,
) {
    let deadline = async {
        match flow_timeout {
            Some(t) => tokio::time::sleep(t).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = stop_rx => {
            debug!("Authorization worker stopped before completion");
        }
        _ = deadline => {
            warn!("Authorization timed out; releasing listener");
            let mut state = state.lock();
            if let Some(server) = state.server.as_mut() {
                server.shutdown();
            }
            state.server = None;
            state.terminal = Terminal::Failed(
                "authorization timed out; no response from the browser".to_string(),
            );
            state.phase = Phase::Completed;
        }
        outcome = result_rx => {
            match outcome {
                Ok(Ok(callback)) => {
                    complete_exchange(&state, &token_client, &callback, &code_verifier).await;
                }
                Ok(Err(e)) => {
                    finish(&state, Terminal::Failed(e.to_string()));
                }
                Err(_) => {
                    // Listener dropped without delivering an outcome
                    finish(&state, Terminal::Failed("authorization was cancelled".to_string()));
                }
            }
        }
    }
}

/// Exchange the captured code, then record the terminal outcome
async fn complete_exchange(
    state: &Arc<Mutex<SessionState>>,
    token_client: &TokenClient,
    callback: &CallbackResult,
    code_verifier: &str,
) {
    info!("Authorization code received; exchanging for tokens");
    state.lock().phase = Phase::Exchanging;

    // The oneshot outcome channel guarantees this runs at most once per
    // session.
    match token_client.exchange(&callback.code, code_verifier).await {
        Ok(tokens) => {
            let user = extract_user_identity(&tokens.access_token);
            info!("Authorization completed for {}", user.name);
            finish(state, Terminal::Succeeded(Some(AuthHandoff { tokens, user })));
        }
        Err(e) => {
            // Exchange failures share the listener failures' terminal shape
            finish(state, Terminal::Failed(e.to_string()));
        }
    }
}

fn finish(state: &Arc<Mutex<SessionState>>, terminal: Terminal) {
    let mut state = state.lock();
    if let Some(server) = state.server.as_mut() {
        server.shutdown();
    }
    state.server = None;
    state.terminal = terminal;
    state.phase = Phase::Completed;
}
