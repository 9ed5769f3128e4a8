//! OAuth token exchange and refresh
//!
//! One form-encoded POST per operation, bounded by a per-request timeout and
//! never retried here; retry is a caller decision.

use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{error, info};

use crate::claims::decode_claims;
use crate::config::AuthConfig;
use crate::types::TokenSet;
use fmm_types::{AuthError, AuthResult};

/// Bound applied to each token-endpoint request
const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(15);

/// Expiry window assumed when the server omits `expires_in`
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Token response from the OAuth server
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,

    #[serde(default)]
    token_type: String,

    #[serde(default)]
    expires_in: Option<i64>,

    #[serde(default)]
    refresh_token: Option<String>,
}

/// Client for the provider's token endpoint
pub struct TokenClient {
    client: Client,
    config: AuthConfig,
}

impl TokenClient {
    /// Create a token client for the given configuration
    pub fn new(config: AuthConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Exchange an authorization code for access + refresh tokens
    ///
    /// `expires_at` is stamped at receipt as now + `expires_in`, falling back
    /// to one hour when the server omits the field.
    pub async fn exchange(&self, code: &str, code_verifier: &str) -> AuthResult<TokenSet> {
        let params = [
            ("grant_type", "authorization_code".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("redirect_uri", self.config.redirect_uri()),
            ("code", code.to_string()),
            ("code_verifier", code_verifier.to_string()),
            ("scope", self.config.scope()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .timeout(REQUEST_TIMEOUT)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed with status {}: {}", status, body);
            return Err(AuthError::AuthServer { status, body });
        }

        let tokens = self.parse_token_response(response, None).await?;
        info!("Token exchange successful");
        Ok(tokens)
    }

    /// Use a refresh token to obtain a new access token
    ///
    /// Any 4xx answer means the grant itself is gone (revoked or expired);
    /// the caller should start a fresh authorization rather than retry.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenSet> {
        let params = [
            ("grant_type", "refresh_token".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("refresh_token", refresh_token.to_string()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .timeout(REQUEST_TIMEOUT)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Transport(format!("token refresh failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            error!("Token refresh rejected with status {}", status);
            return Err(AuthError::RevokedToken);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Token refresh failed with status {}: {}", status, body);
            return Err(AuthError::AuthServer {
                status: status.as_u16(),
                body,
            });
        }

        let tokens = self
            .parse_token_response(response, Some(refresh_token))
            .await?;
        info!("Token refresh successful");
        Ok(tokens)
    }

    /// Parse a successful token response and stamp expiry at receipt time
    async fn parse_token_response(
        &self,
        response: reqwest::Response,
        previous_refresh_token: Option<&str>,
    ) -> AuthResult<TokenSet> {
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(format!("failed to read token response: {}", e)))?;
        let token_response: TokenResponse = serde_json::from_str(&body)?;

        let acquired_at = Utc::now();
        let expires_at = acquired_at
            + Duration::seconds(token_response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN));

        let claims = decode_claims(&token_response.access_token);
        let claims = claims
            .as_object()
            .is_some_and(|m| !m.is_empty())
            .then_some(claims);

        Ok(TokenSet {
            access_token: token_response.access_token,
            // Keep the old refresh token when the server does not rotate it
            refresh_token: token_response
                .refresh_token
                .or_else(|| previous_refresh_token.map(str::to_string)),
            token_type: token_response.token_type,
            expires_in: token_response.expires_in,
            expires_at,
            acquired_at,
            claims,
        })
    }
}
