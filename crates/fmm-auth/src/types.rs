//! Core types for the authentication flows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tokens returned by the provider's token endpoint
///
/// Owned by the caller once handed off; the session keeps no copy. The
/// external settings store persists this as an opaque unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Access token for API requests (a JWT for Nexus)
    pub access_token: String,

    /// Refresh token (if provided)
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    pub token_type: String,

    /// Token lifetime in seconds, as reported by the server
    pub expires_in: Option<i64>,

    /// Absolute expiration, stamped at receipt as now + expires_in.
    /// Never taken verbatim from any other source.
    pub expires_at: DateTime<Utc>,

    /// When the tokens were received
    pub acquired_at: DateTime<Utc>,

    /// Raw access-token claims (unverified), kept for display purposes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<serde_json::Value>,
}

impl TokenSet {
    /// Check whether the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Normalized user identity for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Display name
    pub name: String,

    /// Whether the account has a premium (or lifetime premium) membership
    pub is_premium: bool,

    /// Whether the account has a supporter membership
    pub is_supporter: bool,

    /// Profile image URL (not present in token claims; filled by the
    /// identity endpoint)
    pub profile_url: Option<String>,
}

/// Successful callback capture: the authorization code plus the state value
/// it arrived with
#[derive(Debug, Clone)]
pub struct CallbackResult {
    /// Authorization code
    pub code: String,

    /// State parameter as received (already verified against the session)
    pub state: String,
}

/// Result of starting an OAuth session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStart {
    /// Authorization URL (already opened in the browser unless suppressed)
    pub auth_url: String,

    /// Redirect URI the callback server is listening on
    pub redirect_uri: String,

    /// CSRF state parameter bound to this session
    pub state: String,
}

/// Terminal payload handed to the caller exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthHandoff {
    /// The acquired tokens
    pub tokens: TokenSet,

    /// Identity extracted from the access-token claims
    pub user: UserIdentity,
}

/// Snapshot returned by [`OAuthSession::poll`](crate::OAuthSession::poll)
///
/// Never a hard fault: failures are carried as values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionResult {
    /// `start()` has not been called
    Idle,

    /// Waiting for the user to complete authorization in the browser
    Pending,

    /// Exchanging the authorization code for tokens
    Exchanging,

    /// Completed successfully; the tokens travel with this value and the
    /// session keeps no reference to them
    Success(AuthHandoff),

    /// Completed with a failure (listener, exchange, or timeout)
    Failed {
        /// Error description
        message: String,
    },

    /// Completed successfully; the handoff was delivered by an earlier poll
    Completed,

    /// Session was stopped
    Stopped,
}

impl SessionResult {
    /// Check if the flow is still in progress
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionResult::Pending | SessionResult::Exchanging)
    }

    /// Check if the flow reached a terminal state
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            SessionResult::Success(_)
                | SessionResult::Failed { .. }
                | SessionResult::Completed
                | SessionResult::Stopped
        )
    }

    /// Check if the flow completed successfully with a handoff
    pub fn is_success(&self) -> bool {
        matches!(self, SessionResult::Success(_))
    }

    /// Extract the handoff if this is the delivering poll
    pub fn into_handoff(self) -> Option<AuthHandoff> {
        match self {
            SessionResult::Success(handoff) => Some(handoff),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_tokens() -> TokenSet {
        let now = Utc::now();
        TokenSet {
            access_token: "test_token".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            expires_at: now + Duration::seconds(3600),
            acquired_at: now,
            claims: None,
        }
    }

    #[test]
    fn test_token_set_not_expired() {
        assert!(!test_tokens().is_expired());
    }

    #[test]
    fn test_token_set_expired() {
        let mut tokens = test_tokens();
        tokens.expires_at = Utc::now() - Duration::seconds(10);
        assert!(tokens.is_expired());
    }

    #[test]
    fn test_session_result_is_pending() {
        assert!(SessionResult::Pending.is_pending());
        assert!(SessionResult::Exchanging.is_pending());
        assert!(!SessionResult::Idle.is_pending());
        assert!(!SessionResult::Stopped.is_pending());
    }

    #[test]
    fn test_session_result_is_complete() {
        let success = SessionResult::Success(AuthHandoff {
            tokens: test_tokens(),
            user: UserIdentity::default(),
        });
        assert!(success.is_complete());
        assert!(success.is_success());

        let failed = SessionResult::Failed {
            message: "test error".to_string(),
        };
        assert!(failed.is_complete());
        assert!(!failed.is_success());

        assert!(!SessionResult::Idle.is_complete());
        assert!(!SessionResult::Pending.is_complete());
        assert!(SessionResult::Completed.is_complete());
        assert!(SessionResult::Stopped.is_complete());
    }

    #[test]
    fn test_session_result_into_handoff() {
        let success = SessionResult::Success(AuthHandoff {
            tokens: test_tokens(),
            user: UserIdentity {
                name: "TestUser".to_string(),
                ..UserIdentity::default()
            },
        });
        let handoff = success.into_handoff().unwrap();
        assert_eq!(handoff.tokens.access_token, "test_token");
        assert_eq!(handoff.user.name, "TestUser");

        let failed = SessionResult::Failed {
            message: "test".to_string(),
        };
        assert!(failed.into_handoff().is_none());
    }
}
