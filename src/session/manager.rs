//! The session manager: one instance per process, shared behind `Arc`.
//!
//! All signing-in, silent refresh and signing-out funnels through here
//! so the rest of the app only ever asks two questions: "give me a
//! token I can call the API with" ([`SessionManager::ensure_fresh`])
//! and "what does the session look like right now"
//! ([`SessionManager::snapshot`] / [`SessionManager::subscribe`]).
//!
//! Concurrency model:
//! - `refresh_gate` makes silent refresh single-flight. A caller that
//!   finds the gate taken waits, then re-checks the stored token; when
//!   the winner already renewed it there is nothing left to do, and
//!   when the winner's flight ended the session the waiter reports the
//!   same outcome.
//! - `epoch` detects awaited work that lost a race with login or
//!   logout. Session replacement bumps the epoch; refresh and login
//!   outcomes are only committed while the epoch they started under is
//!   still current, so a logout can never be undone by a slow response
//!   landing late.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use super::state::{LoginOutcome, SessionSnapshot, SessionState};
use crate::api::response::ApiError;
use crate::api::types::{LoginRequest, TokenPair, UserProfile};
use crate::api::AuthApi;
use crate::config::Config;
use crate::store::TokenStore;
use crate::token::codec;

// ============================================================================
// Operation errors
// ============================================================================

#[derive(Debug, Error)]
pub enum LoginError {
    /// The server refused the credentials (4xx)
    #[error("Credentials rejected: {0}")]
    InvalidCredentials(String),
    /// The request never reached the server
    #[error("Network error during login: {0}")]
    Network(reqwest::Error),
    /// Server-side failure or a response that did not match the contract
    #[error("Login failed: {0}")]
    Other(ApiError),
    /// Tokens were issued and stored but the profile fetch failed. The
    /// session is live; retry via [`SessionManager::refresh_profile`].
    #[error("Login succeeded but the profile fetch failed: {0}")]
    Profile(ApiError),
    /// A concurrent logout (or newer login) replaced the session while
    /// this attempt was in flight; its result was discarded
    #[error("Login superseded by a concurrent session change")]
    Superseded,
}

impl LoginError {
    fn from_api(error: ApiError) -> Self {
        match error {
            ApiError::Rejected { message, .. } => LoginError::InvalidCredentials(message),
            ApiError::Network(e) => LoginError::Network(e),
            other => LoginError::Other(other),
        }
    }
}

/// Why no usable access token could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// There is no session: the user never signed in or has signed out
    #[error("No active session")]
    NotAuthenticated,
    /// A session existed but could not be renewed; it has been cleared
    #[error("Session expired")]
    SessionExpired,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile fetch failed: {0}")]
    Api(#[from] ApiError),
    #[error("No usable session: {0}")]
    Session(#[from] SessionError),
}

// ============================================================================
// Session manager
// ============================================================================

/// State carried by the refresh gate: the epoch produced when the most
/// recent flight ended the session. A waiter that finds it equal to the
/// current epoch knows the cleared store is the outcome of the flight it
/// joined, not a session that never existed.
#[derive(Debug, Default)]
struct RefreshFlight {
    cleared_at_epoch: Option<u64>,
}

pub struct SessionManager {
    api: AuthApi,
    config: Config,
    /// Bumped on every session replacement (login, logout, forced clear).
    /// Guards store writes and state publishes, never held across awaits.
    epoch: std::sync::Mutex<u64>,
    /// Serializes rehydration so concurrent callers collapse onto one run
    init_gate: Mutex<()>,
    /// Single-flight gate for silent refresh
    refresh_gate: Mutex<RefreshFlight>,
    state_tx: watch::Sender<SessionSnapshot>,
    store: Arc<TokenStore>,
}

impl SessionManager {
    pub fn new(config: Config, api: AuthApi, store: Arc<TokenStore>) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::uninitialized());
        Self {
            api,
            config,
            epoch: std::sync::Mutex::new(0),
            init_gate: Mutex::new(()),
            refresh_gate: Mutex::new(RefreshFlight::default()),
            state_tx,
            store,
        }
    }

    // ===== Observation =====

    /// Current state and cached profile.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_tx.borrow().clone()
    }

    /// Watch session changes. The receiver always yields the latest
    /// snapshot; intermediate states may be skipped under load.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    /// Cached profile, when one has been fetched for the live session.
    pub fn user(&self) -> Option<UserProfile> {
        self.state_tx.borrow().user.clone()
    }

    /// Whether an unexpired access token is stored right now. Computed
    /// from the token itself, not from the published state, so it stays
    /// truthful while a transition is mid-flight.
    pub fn is_authenticated(&self) -> bool {
        self.store
            .access_token()
            .map(|token| !codec::is_expired(&token))
            .unwrap_or(false)
    }

    // ===== Lifecycle =====

    /// Rehydrate the session from storage. Runs the real work once;
    /// later and concurrent calls return the already-established state.
    ///
    /// A stored valid token restores the session directly (profile
    /// fetched best-effort). A stored refresh token with a dead access
    /// token triggers a silent refresh. Anything less means anonymous,
    /// decided without touching the network.
    pub async fn initialize(&self) -> SessionSnapshot {
        let _init = self.init_gate.lock().await;
        if self.snapshot().state != SessionState::Uninitialized {
            return self.snapshot();
        }
        let started_epoch = *self.epoch_guard();

        match self.store.access_token() {
            Some(token) if !codec::is_expired(&token) => {
                match self.api.fetch_profile(&token).await {
                    Ok(profile) => {
                        let user_id = profile.user_id.clone();
                        if self.commit_session(
                            started_epoch,
                            SessionState::Authenticated,
                            Some(profile),
                        ) {
                            tracing::info!(user_id = %user_id, "Session restored from storage");
                        }
                    }
                    Err(e) if e.is_unauthorized() => {
                        // Locally valid but rejected server-side (revoked,
                        // or clock skew). Treat like an expired token.
                        tracing::info!(
                            "Stored access token rejected by the API; attempting silent refresh"
                        );
                        let mut flight = self.refresh_gate.lock().await;
                        let _ = self.refresh_locked(&mut flight).await;
                    }
                    Err(e) => {
                        // Offline start with a valid token: stay signed in,
                        // the profile loads on the next successful call.
                        tracing::warn!(
                            error = %e,
                            "Profile fetch failed during startup; continuing without profile"
                        );
                        self.commit_session(started_epoch, SessionState::Authenticated, None);
                    }
                }
            }
            stored => {
                if self.store.refresh_token().is_some() {
                    tracing::info!(
                        had_access_token = stored.is_some(),
                        "No valid stored access token; attempting silent refresh"
                    );
                    let mut flight = self.refresh_gate.lock().await;
                    let _ = self.refresh_locked(&mut flight).await;
                } else {
                    let epoch = self.epoch_guard();
                    if *epoch == started_epoch {
                        if stored.is_some() {
                            // Expired leftover with nothing to renew it.
                            self.store.clear_tokens();
                        }
                        tracing::info!("No stored session");
                        self.publish(SessionState::Anonymous, None);
                    }
                }
            }
        }

        self.snapshot()
    }

    /// Exchange provider credentials for a session. On success the
    /// token pair is persisted before anything else can observe it; on
    /// rejection nothing about the current session changes. A logout
    /// that lands while the exchange is out wins over the new tokens.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, LoginError> {
        let started_epoch = *self.epoch_guard();
        let pair = self.api.login(&request).await.map_err(LoginError::from_api)?;

        let login_epoch = {
            // A new session supersedes any in-flight refresh of the old
            // one, but only while nothing else replaced the session.
            let mut epoch = self.epoch_guard();
            if *epoch != started_epoch {
                tracing::info!("Discarding login that lost a race with logout");
                return Err(LoginError::Superseded);
            }
            *epoch += 1;
            self.store
                .set_token_pair(&pair.access_token, pair.refresh_token.as_deref());
            *epoch
        };
        tracing::info!(provider = ?request.provider, "Login succeeded");

        match self.api.fetch_profile(&pair.access_token).await {
            Ok(profile) => {
                if !self.commit_session(
                    login_epoch,
                    SessionState::Authenticated,
                    Some(profile.clone()),
                ) {
                    return Err(LoginError::Superseded);
                }
                Ok(LoginOutcome {
                    is_profile_complete: profile.is_profile_complete,
                    user: profile,
                })
            }
            Err(e) => {
                if !self.commit_session(login_epoch, SessionState::Authenticated, None) {
                    return Err(LoginError::Superseded);
                }
                Err(LoginError::Profile(e))
            }
        }
    }

    /// End the session. Server-side revocation is best-effort; the
    /// local session is cleared no matter what. Safe to call repeatedly.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.store.refresh_token() {
            tracing::debug!("Revoking refresh token server-side");
            if let Err(e) = self.api.logout(&refresh_token).await {
                tracing::warn!(error = %e, "Server-side logout failed; clearing local session anyway");
            }
        }
        self.clear_local(SessionState::LoggedOut);
        tracing::info!("Logged out");
    }

    // ===== Token access =====

    /// Return an access token that is valid and outside the refresh
    /// threshold, renewing it first when necessary.
    pub async fn ensure_fresh(&self) -> Result<String, SessionError> {
        if self.snapshot().state == SessionState::Uninitialized {
            self.initialize().await;
        }

        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let mut flight = self.refresh_gate.lock().await;
        // Re-check after the wait: whoever held the gate may have
        // renewed the token already.
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }
        // A waiter whose flight ended the session resolves like the
        // caller that performed the refresh.
        if flight.cleared_at_epoch == Some(*self.epoch_guard()) {
            return Err(SessionError::SessionExpired);
        }
        self.refresh_locked(&mut flight).await
    }

    /// `Authorization` header value for an outgoing API call.
    pub async fn bearer_header(&self) -> Result<String, SessionError> {
        Ok(format!("Bearer {}", self.ensure_fresh().await?))
    }

    /// Re-fetch the profile for the live session and publish it.
    pub async fn refresh_profile(&self) -> Result<UserProfile, ProfileError> {
        let token = self.ensure_fresh().await?;
        let started_epoch = *self.epoch_guard();
        let profile = self.api.fetch_profile(&token).await?;
        if !self.commit_session(
            started_epoch,
            SessionState::Authenticated,
            Some(profile.clone()),
        ) {
            return Err(SessionError::NotAuthenticated.into());
        }
        Ok(profile)
    }

    // ===== Internal =====

    /// Stored access token when it is valid and not yet inside the
    /// refresh threshold.
    fn fresh_token(&self) -> Option<String> {
        let token = self.store.access_token()?;
        let threshold = self.config.refresh.expiry_threshold_secs;
        if codec::is_expired(&token) || codec::is_expiring_soon(&token, threshold) {
            None
        } else {
            Some(token)
        }
    }

    /// Perform one refresh attempt. Caller must hold `refresh_gate`.
    async fn refresh_locked(&self, flight: &mut RefreshFlight) -> Result<String, SessionError> {
        // Read the token and announce the flight under the epoch guard
        // so a concurrent clear cannot slip between the two.
        let (refresh_token, started_epoch) = {
            let mut epoch = self.epoch_guard();
            match self.store.refresh_token() {
                Some(token) => {
                    self.publish(SessionState::Refreshing, self.user());
                    (token, *epoch)
                }
                None => {
                    if self.snapshot().state.is_anonymous() {
                        return Err(SessionError::NotAuthenticated);
                    }
                    // A session existed but there is nothing to renew it with.
                    tracing::info!("Access token expired with no refresh token; ending session");
                    self.clear_under(&mut epoch, SessionState::Anonymous);
                    flight.cleared_at_epoch = Some(*epoch);
                    return Err(SessionError::SessionExpired);
                }
            }
        };
        tracing::debug!("Refreshing access token");

        match self.api.refresh(&refresh_token).await {
            Ok(pair) => {
                // Hydrate the profile with the new token before committing
                // so observers see the finished state in one step.
                let user = match self.api.fetch_profile(&pair.access_token).await {
                    Ok(profile) => Some(profile),
                    Err(e) => {
                        tracing::debug!(
                            error = %e,
                            "Profile fetch after refresh failed; keeping cached profile"
                        );
                        self.user()
                    }
                };
                if !self.commit_refresh(started_epoch, &pair, user) {
                    tracing::debug!("Discarding refresh that lost a race with logout");
                    return Err(SessionError::NotAuthenticated);
                }
                tracing::info!("Access token refreshed");
                Ok(pair.access_token)
            }
            Err(e) => {
                let mut epoch = self.epoch_guard();
                if *epoch != started_epoch {
                    return Err(SessionError::NotAuthenticated);
                }
                tracing::warn!(error = %e, "Token refresh failed; ending session");
                self.clear_under(&mut epoch, SessionState::Anonymous);
                flight.cleared_at_epoch = Some(*epoch);
                Err(SessionError::SessionExpired)
            }
        }
    }

    /// Commit a refresh outcome unless the session was replaced while
    /// the request was in flight.
    fn commit_refresh(
        &self,
        started_epoch: u64,
        pair: &TokenPair,
        user: Option<UserProfile>,
    ) -> bool {
        let epoch = self.epoch_guard();
        if *epoch != started_epoch {
            return false;
        }
        self.store
            .set_token_pair(&pair.access_token, pair.refresh_token.as_deref());
        self.publish(SessionState::Authenticated, user);
        true
    }

    /// Publish a state reached through an awaited call unless the
    /// session was replaced while the call was in flight.
    fn commit_session(
        &self,
        started_epoch: u64,
        state: SessionState,
        user: Option<UserProfile>,
    ) -> bool {
        let epoch = self.epoch_guard();
        if *epoch != started_epoch {
            return false;
        }
        self.publish(state, user);
        true
    }

    fn clear_local(&self, state: SessionState) {
        let mut epoch = self.epoch_guard();
        self.clear_under(&mut epoch, state);
    }

    fn clear_under(&self, epoch: &mut u64, state: SessionState) {
        *epoch += 1;
        self.store.clear_tokens();
        self.publish(state, None);
    }

    fn epoch_guard(&self) -> std::sync::MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: SessionState, user: Option<UserProfile>) {
        let snapshot = SessionSnapshot { state, user };
        let changed = { *self.state_tx.borrow() != snapshot };
        if changed {
            tracing::debug!(state = ?snapshot.state, "Session state changed");
            self.state_tx.send_replace(snapshot);
        }
    }
}
