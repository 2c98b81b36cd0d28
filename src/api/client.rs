use std::time::Duration;

use super::response::{parse_envelope, parse_failure, ApiError};
use super::types::{LoginRequest, LogoutRequest, RefreshRequest, TokenPair, UserProfile};
use crate::config::ApiConfig;

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";
const PROFILE_PATH: &str = "/users/me";

/// Thin typed wrapper over the auth endpoints. Owns the HTTP client;
/// cheap to share behind the session manager.
pub struct AuthApi {
    base_url: String,
    client: reqwest::Client,
}

impl AuthApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        // Parse up front so a bad URL surfaces at startup, not on the
        // first login attempt.
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| ApiError::BaseUrl(format!("{}: {e}", config.base_url)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Exchange a provider authorization code for a token pair.
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenPair, ApiError> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(request)
            .send()
            .await?;
        parse_envelope(response).await
    }

    /// Trade a refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let request = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&request)
            .send()
            .await?;
        parse_envelope(response).await
    }

    /// Invalidate a refresh token server-side. The response body is
    /// ignored beyond the status line.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let request = LogoutRequest {
            refresh_token: refresh_token.to_string(),
        };
        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .json(&request)
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(parse_failure(response).await)
    }

    /// Fetch the caller's profile using a bearer access token.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        let response = self
            .client
            .get(self.url(PROFILE_PATH))
            .bearer_auth(access_token)
            .send()
            .await?;
        parse_envelope(response).await
    }
}
