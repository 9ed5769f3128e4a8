//! Authentication flow configuration

use std::time::Duration;

/// Nexus OAuth authorization endpoint
pub const NEXUS_AUTHORIZE_URL: &str = "https://users.nexusmods.com/oauth/authorize";

/// Nexus OAuth token endpoint
pub const NEXUS_TOKEN_URL: &str = "https://users.nexusmods.com/oauth/token";

/// Nexus identity ("who am I") endpoint
pub const NEXUS_VALIDATE_URL: &str = "https://api.nexusmods.com/v1/users/validate.json";

/// Nexus personal API key page, for the manual-key fallback
pub const NEXUS_API_KEY_PAGE: &str = "https://www.nexusmods.com/users/myaccount?tab=api+access";

// TODO: replace with registered Client ID
const CLIENT_ID: &str = "fromsoft_mod_manager";

/// Fixed callback port. This value is embedded in the redirect URI registered
/// with Nexus, so it cannot vary per run.
pub const CALLBACK_PORT: u16 = 9876;

/// Callback route on the local server
pub const CALLBACK_PATH: &str = "/callback";

/// Default flow timeout (5 minutes)
const FLOW_TIMEOUT_SECS: u64 = 300;

/// Configuration for the authentication flows
///
/// `Default` is the production Nexus Mods configuration. Tests point the
/// URLs at stub servers and disable the browser launch.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID (public client, PKCE only)
    pub client_id: String,

    /// Authorization endpoint URL
    pub authorize_url: String,

    /// Token endpoint URL
    pub token_url: String,

    /// Identity endpoint URL
    pub validate_url: String,

    /// Personal API key page for the manual fallback
    pub api_key_page: String,

    /// Requested scopes (empty for Nexus)
    pub scopes: Vec<String>,

    /// Port for the local callback server. Must match the redirect URI
    /// registered with the provider.
    pub callback_port: u16,

    /// Callback route on the local server
    pub callback_path: String,

    /// Deadline on the waiting phase. When it expires the session records a
    /// terminal failure and releases the listener. `None` disables the
    /// deadline, leaving teardown entirely to the caller's `stop()`.
    pub flow_timeout: Option<Duration>,

    /// Open the authorize URL in the system browser on `start()`
    pub open_browser: bool,
}

impl AuthConfig {
    /// The redirect URI sent to the provider, derived from the callback
    /// port and path.
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.callback_port, self.callback_path)
    }

    /// Space-joined scope string for the authorize and token requests
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: CLIENT_ID.to_string(),
            authorize_url: NEXUS_AUTHORIZE_URL.to_string(),
            token_url: NEXUS_TOKEN_URL.to_string(),
            validate_url: NEXUS_VALIDATE_URL.to_string(),
            api_key_page: NEXUS_API_KEY_PAGE.to_string(),
            scopes: Vec::new(),
            callback_port: CALLBACK_PORT,
            callback_path: CALLBACK_PATH.to_string(),
            flow_timeout: Some(Duration::from_secs(FLOW_TIMEOUT_SECS)),
            open_browser: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_redirect_uri() {
        let config = AuthConfig::default();
        assert_eq!(config.redirect_uri(), "http://127.0.0.1:9876/callback");
    }

    #[test]
    fn test_redirect_uri_follows_port() {
        let config = AuthConfig {
            callback_port: 8123,
            ..AuthConfig::default()
        };
        assert_eq!(config.redirect_uri(), "http://127.0.0.1:8123/callback");
    }

    #[test]
    fn test_default_scope_is_empty() {
        assert_eq!(AuthConfig::default().scope(), "");
    }

    #[test]
    fn test_scope_joining() {
        let config = AuthConfig {
            scopes: vec!["read".to_string(), "write".to_string()],
            ..AuthConfig::default()
        };
        assert_eq!(config.scope(), "read write");
    }
}
