pub mod manager;
pub mod state;

pub use manager::{LoginError, ProfileError, SessionError, SessionManager};
pub use state::{LoginOutcome, SessionSnapshot, SessionState};
