//! unear-session - client-side session and token lifecycle for the U:NEAR API
//!
//! This crate is the authenticated-session core embedded by U:NEAR client
//! shells. It provides:
//! - Unverified bearer-token claims decoding with fail-safe expiry answers
//! - Durable token storage (redb) that degrades to memory-only operation
//! - A session state machine with single-flight silent refresh
//! - Route guarding with login redirects and return-path preservation

pub mod api;
pub mod config;
pub mod guard;
pub mod session;
pub mod store;
#[cfg(test)]
pub mod testutil;
pub mod token;

use std::sync::Arc;

use api::{ApiError, AuthApi};
use config::Config;
use guard::{FirstRunGate, RouteGuard};
use session::SessionManager;
use store::TokenStore;

/// Fully wired session stack for embedders.
pub struct SessionRuntime {
    pub config: Config,
    /// First-run gate; present when an onboarding path is configured
    pub first_run: Option<FirstRunGate>,
    pub guard: RouteGuard,
    pub manager: Arc<SessionManager>,
    pub store: Arc<TokenStore>,
}

impl SessionRuntime {
    /// Assemble the store, API client, session manager and route guard.
    ///
    /// Fails only when the configured base URL is unusable or the HTTP
    /// client cannot be built; a broken storage directory degrades to
    /// memory-only operation instead of failing.
    pub fn from_config(config: Config) -> Result<Self, ApiError> {
        let store = Arc::new(TokenStore::open(&config.storage.data_dir));
        let api = AuthApi::new(&config.api)?;
        let manager = Arc::new(SessionManager::new(config.clone(), api, Arc::clone(&store)));
        let guard = RouteGuard::new(Arc::clone(&manager), config.routes.login_path.clone());
        let first_run = config
            .routes
            .onboarding_path
            .clone()
            .map(|path| FirstRunGate::new(Arc::clone(&store), path));
        Ok(Self {
            config,
            first_run,
            guard,
            manager,
            store,
        })
    }
}
