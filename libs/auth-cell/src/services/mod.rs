pub mod auth;
pub mod guard;
pub mod session;

pub use auth::AuthService;
pub use guard::{GuardOutcome, SessionGuard};
pub use session::SessionManager;
