//! Shared test helpers — available to all `#[cfg(test)]` modules in the crate.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;

use crate::api::AuthApi;
use crate::config::{ApiConfig, Config, RefreshConfig, RouteConfig, StorageConfig};
use crate::session::SessionManager;
use crate::store::TokenStore;

/// Open a fresh token store in a temporary directory.
///
/// Returns both the `TokenStore` and the `TempDir` guard — the caller
/// must keep the `TempDir` alive for the duration of the test.
pub fn setup_store() -> (TokenStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = TokenStore::open(temp_dir.path());
    (store, temp_dir)
}

/// A `Config` pointing at the given API host, with the default 300s
/// refresh threshold.
pub fn test_config(base_url: &str, data_dir: &str) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
        },
        refresh: RefreshConfig::default(),
        routes: RouteConfig::default(),
        storage: StorageConfig {
            data_dir: data_dir.to_string(),
        },
    }
}

/// Build a `SessionManager` against `base_url` with a fresh temp store.
///
/// The store is returned separately so tests can seed tokens before
/// initializing and inspect them afterwards.
pub fn test_manager(base_url: &str) -> (Arc<SessionManager>, Arc<TokenStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(base_url, temp_dir.path().to_str().unwrap());
    let store = Arc::new(TokenStore::open(temp_dir.path()));
    let api = AuthApi::new(&config.api).unwrap();
    let manager = Arc::new(SessionManager::new(config, api, Arc::clone(&store)));
    (manager, store, temp_dir)
}

/// Forge an unsigned bearer token whose `exp` lies `exp_offset_secs`
/// away from now (negative for an already-expired token).
pub fn forge_token(exp_offset_secs: i64) -> String {
    let now = Utc::now().timestamp();
    forge_token_with(serde_json::json!({
        "sub": "user-123",
        "iat": now,
        "exp": now + exp_offset_secs,
    }))
}

/// Forge an unsigned bearer token around an arbitrary claims payload.
pub fn forge_token_with(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.forged-signature")
}

/// JSend success envelope around `data`.
pub fn jsend_success(data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "status": "success", "data": data })
}

/// JSend fail envelope carrying `message`.
pub fn jsend_fail(message: &str) -> serde_json::Value {
    serde_json::json!({ "status": "fail", "data": { "message": message } })
}

/// Token pair payload as the login and refresh endpoints return it.
pub fn token_pair_body(access: &str, refresh: Option<&str>) -> serde_json::Value {
    match refresh {
        Some(refresh) => serde_json::json!({
            "accessToken": access,
            "refreshToken": refresh,
        }),
        None => serde_json::json!({ "accessToken": access }),
    }
}

/// Profile payload as `/users/me` returns it.
pub fn profile_body(is_profile_complete: bool) -> serde_json::Value {
    serde_json::json!({
        "userId": "user-123",
        "username": "jiwoo",
        "email": "jiwoo@example.com",
        "grade": "VIP",
        "membershipCode": "1234-5678",
        "isProfileComplete": is_profile_complete,
    })
}
