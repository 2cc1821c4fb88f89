//! OAuth client for the external identity provider.
//!
//! Exchanges an authorization code (with its PKCE verifier) for an access
//! token, then reads the user's profile from the userinfo endpoint.

use std::time::Duration;

use serde::Deserialize;

use crate::types::config::OAuthConfig;
use crate::types::errors::AuthError;
use crate::types::identity::ProviderProfile;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// HTTP client for the provider's token and userinfo endpoints.
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("markd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Trades `code` for the signed-in user's profile.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderProfile, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose()),
            ("code_verifier", code_verifier),
        ];

        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;
        if !status.is_success() {
            tracing::warn!(status = %status, "token exchange rejected");
            return Err(AuthError::ProviderError(format!("token endpoint returned {}", status)));
        }
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::ProviderError(format!("bad token response: {}", e)))?;

        let resp = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;
        if !status.is_success() {
            return Err(AuthError::ProviderError(format!("userinfo endpoint returned {}", status)));
        }
        parse_profile(&body)
    }
}

/// Parses a userinfo document into a profile.
pub fn parse_profile(body: &str) -> Result<ProviderProfile, AuthError> {
    let profile: ProviderProfile = serde_json::from_str(body)
        .map_err(|e| AuthError::ProviderError(format!("bad userinfo response: {}", e)))?;
    if profile.sub.is_empty() {
        return Err(AuthError::ProviderError("userinfo has no subject".to_string()));
    }
    Ok(profile)
}
