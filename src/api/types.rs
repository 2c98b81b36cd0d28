use serde::{Deserialize, Serialize};

/// Identity providers accepted by the login endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Apple,
    Kakao,
    Naver,
}

/// Credentials presented to `POST /auth/login`: the authorization code
/// handed back by the provider's consent screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub code: String,
    pub provider: Provider,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Token material returned by login and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    /// Absent when the server chose not to rotate the refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Identity and display data cached alongside the session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub email: Option<String>,
    /// Loyalty tier name, e.g. "VIP"
    #[serde(default)]
    pub grade: Option<String>,
    /// False until the user has filled in the post-signup profile form
    pub is_profile_complete: bool,
    #[serde(default)]
    pub membership_code: Option<String>,
    pub user_id: String,
    pub username: String,
}
