//! Identity ("who am I") endpoint client
//!
//! One authenticated GET against the Nexus validate endpoint, used to check
//! a pasted personal key and to revalidate a stored session.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::claims::{PREMIUM_ROLES, SUPPORTER_ROLE};
use crate::config::AuthConfig;
use crate::types::UserIdentity;
use fmm_types::{AuthError, AuthResult};

/// Bound applied to each identity request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Credential presented to the identity endpoint
#[derive(Debug, Clone)]
pub enum ApiAuth {
    /// OAuth access token, sent as `Authorization: Bearer`
    Bearer(String),

    /// Personal API key, sent in the `apikey` header
    ApiKey(String),
}

/// Response from the validate endpoint
///
/// The endpoint reports membership both as flags and as a role list
/// depending on API version; either is honored.
#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    name: String,

    #[serde(default)]
    is_premium: bool,

    #[serde(default)]
    is_supporter: bool,

    #[serde(default)]
    membership_roles: Vec<String>,

    #[serde(default)]
    profile_url: Option<String>,
}

impl ValidateResponse {
    fn into_identity(self) -> UserIdentity {
        let premium_role = self
            .membership_roles
            .iter()
            .any(|r| PREMIUM_ROLES.contains(&r.as_str()));
        let supporter_role = self.membership_roles.iter().any(|r| r == SUPPORTER_ROLE);

        UserIdentity {
            name: self.name,
            is_premium: self.is_premium || premium_role,
            is_supporter: self.is_supporter || supporter_role,
            profile_url: self.profile_url.filter(|u| !u.is_empty()),
        }
    }
}

/// Client for the provider's identity endpoint
pub struct IdentityClient {
    client: Client,
    validate_url: String,
}

impl IdentityClient {
    /// Create an identity client for the given configuration
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            client: Client::new(),
            validate_url: config.validate_url.clone(),
        }
    }

    /// Perform one "who am I" request with the given credential
    ///
    /// Shares the error taxonomy of the OAuth path: transport failures and
    /// non-success statuses surface as the same error kinds the token
    /// client produces.
    pub async fn validate(&self, auth: &ApiAuth) -> AuthResult<UserIdentity> {
        debug!("Validating credentials against {}", self.validate_url);

        let request = self
            .client
            .get(&self.validate_url)
            .timeout(REQUEST_TIMEOUT);
        let request = match auth {
            ApiAuth::Bearer(token) => request.bearer_auth(token),
            ApiAuth::ApiKey(key) => request.header("apikey", key),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("identity request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("Identity request failed with status {}: {}", status, body);
            return Err(AuthError::AuthServer { status, body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(format!("failed to read identity response: {}", e)))?;
        let validated: ValidateResponse = serde_json::from_str(&body)?;

        Ok(validated.into_identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_response_with_flags() {
        let json = r#"{
            "user_id": 12345,
            "name": "DragonSlayer",
            "is_premium": true,
            "is_supporter": false,
            "profile_url": "https://example.com/avatar.png"
        }"#;

        let identity: UserIdentity = serde_json::from_str::<ValidateResponse>(json)
            .unwrap()
            .into_identity();
        assert_eq!(identity.name, "DragonSlayer");
        assert!(identity.is_premium);
        assert!(!identity.is_supporter);
        assert_eq!(
            identity.profile_url.as_deref(),
            Some("https://example.com/avatar.png")
        );
    }

    #[test]
    fn test_validate_response_with_role_list() {
        let json = r#"{
            "name": "Hollow",
            "membership_roles": ["member", "supporter"]
        }"#;

        let identity = serde_json::from_str::<ValidateResponse>(json)
            .unwrap()
            .into_identity();
        assert!(!identity.is_premium);
        assert!(identity.is_supporter);
    }

    #[test]
    fn test_empty_profile_url_becomes_none() {
        let json = r#"{"name": "Knight", "profile_url": ""}"#;

        let identity = serde_json::from_str::<ValidateResponse>(json)
            .unwrap()
            .into_identity();
        assert_eq!(identity.profile_url, None);
    }
}
