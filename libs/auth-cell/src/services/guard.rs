use tracing::{debug, error, warn};

use shared_models::auth::Session;

use crate::models::Route;
use crate::services::session::SessionManager;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    Granted(Session),
    /// The view needs no session.
    Public,
    Redirect(Route),
}

impl GuardOutcome {
    pub fn session(self) -> Option<Session> {
        match self {
            GuardOutcome::Granted(session) => Some(session),
            GuardOutcome::Public | GuardOutcome::Redirect(_) => None,
        }
    }
}

/// Runs once each time a protected view is entered.
#[derive(Clone)]
pub struct SessionGuard {
    sessions: SessionManager,
}

impl SessionGuard {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    pub fn activate(&self, route: Route) -> GuardOutcome {
        let Some(required) = route.required_role() else {
            return GuardOutcome::Public;
        };

        let session = match self.sessions.load() {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("No session for {}, redirecting to login", route);
                return GuardOutcome::Redirect(Route::Login);
            }
            Err(e) => {
                error!("Could not read persisted session: {}", e);
                self.clear_quietly();
                return GuardOutcome::Redirect(Route::Login);
            }
        };

        if session.role() != required {
            warn!(
                "User {} with role {} tried to open {}, redirecting to login",
                session.user.id,
                session.role(),
                route
            );
            self.clear_quietly();
            return GuardOutcome::Redirect(Route::Login);
        }

        GuardOutcome::Granted(session)
    }

    fn clear_quietly(&self) {
        if let Err(e) = self.sessions.clear() {
            error!("Failed to clear persisted session: {}", e);
        }
    }
}
