//! Session lifecycle states and the observable snapshot.

use crate::api::types::UserProfile;

/// Lifecycle states of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable token material: the user never signed in here, or the
    /// session ended involuntarily
    Anonymous,
    /// A valid access token was held at the last check
    Authenticated,
    /// The user explicitly signed out. Gates exactly like `Anonymous`;
    /// kept distinct so a shell can say "signed out" instead of
    /// "please sign in"
    LoggedOut,
    /// A silent refresh is in flight
    Refreshing,
    /// Rehydration from storage has not run yet
    Uninitialized,
}

impl SessionState {
    /// States with no session at all. Guarded navigation from these
    /// goes straight to login without attempting a refresh.
    pub fn is_anonymous(self) -> bool {
        matches!(self, SessionState::Anonymous | SessionState::LoggedOut)
    }
}

/// Read-only view of the session published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Cached profile; only ever present alongside an authenticated session
    pub user: Option<UserProfile>,
}

impl SessionSnapshot {
    pub(crate) fn uninitialized() -> Self {
        Self {
            state: SessionState::Uninitialized,
            user: None,
        }
    }
}

/// What a successful login hands back for post-login routing.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// False routes the user to the profile-completion form first
    pub is_profile_complete: bool,
    pub user: UserProfile,
}
