//! Navigation gating for protected views.
//!
//! The guard sits between the router and any view that requires a
//! session. It answers one question per navigation: render, or send
//! the user somewhere else first. While [`RouteGuard::authorize`] is
//! pending the shell shows its loading placeholder; the future
//! resolving is the signal to proceed.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::session::SessionManager;
use crate::store::TokenStore;

/// Outcome of a guard check for one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the requested view
    Allow,
    /// Send the user to `location` instead
    Redirect {
        location: String,
        /// The originally requested path, replayed after the user gets
        /// through `location`
        return_to: String,
    },
}

/// Gates navigation on session validity, refreshing the token when it
/// is close to expiry.
pub struct RouteGuard {
    /// Last path that produced an `Allow`; re-checks of the same path
    /// with a still-valid token skip the whole flow so a re-render
    /// storm cannot queue up refresh attempts
    last_allowed: Mutex<Option<String>>,
    login_path: String,
    manager: Arc<SessionManager>,
}

impl RouteGuard {
    pub fn new(manager: Arc<SessionManager>, login_path: impl Into<String>) -> Self {
        Self {
            last_allowed: Mutex::new(None),
            login_path: login_path.into(),
            manager,
        }
    }

    /// Decide whether navigation to `path` may proceed.
    ///
    /// Initializes the session on first use, renews an expiring token,
    /// and otherwise redirects to the login path with the requested
    /// path preserved for post-login replay.
    pub async fn authorize(&self, path: &str) -> GuardDecision {
        {
            let last = self.last_allowed.lock().await;
            if last.as_deref() == Some(path) && self.manager.is_authenticated() {
                tracing::debug!(path = %path, "Re-check of the current path; allowing without refresh");
                return GuardDecision::Allow;
            }
        }

        match self.manager.ensure_fresh().await {
            Ok(_) => {
                *self.last_allowed.lock().await = Some(path.to_string());
                tracing::debug!(path = %path, "Navigation allowed");
                GuardDecision::Allow
            }
            Err(e) => {
                *self.last_allowed.lock().await = None;
                tracing::info!(path = %path, reason = %e, "Navigation blocked; redirecting to login");
                GuardDecision::Redirect {
                    location: self.login_path.clone(),
                    return_to: path.to_string(),
                }
            }
        }
    }
}

/// First-run routing: sends the user to onboarding until the persisted
/// completion flag is set. Orthogonal to authentication.
pub struct FirstRunGate {
    onboarding_path: String,
    store: Arc<TokenStore>,
}

impl FirstRunGate {
    pub fn new(store: Arc<TokenStore>, onboarding_path: impl Into<String>) -> Self {
        Self {
            onboarding_path: onboarding_path.into(),
            store,
        }
    }

    /// Redirect to onboarding unless it has been completed or `path`
    /// already is the onboarding flow.
    pub fn check(&self, path: &str) -> GuardDecision {
        if self.store.onboarding_complete() || path == self.onboarding_path {
            GuardDecision::Allow
        } else {
            GuardDecision::Redirect {
                location: self.onboarding_path.clone(),
                return_to: path.to_string(),
            }
        }
    }

    /// Persist that the user finished onboarding.
    pub fn complete(&self) {
        self.store.set_onboarding_complete(true);
    }
}
