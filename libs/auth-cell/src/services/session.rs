use tracing::{debug, info, warn};

use shared_models::auth::{Session, User};
use shared_models::error::AppError;
use shared_storage::{SharedStorage, TOKEN_KEY, USER_KEY};

/// The one place that reads and writes the persisted session.
#[derive(Clone)]
pub struct SessionManager {
    storage: SharedStorage,
}

impl SessionManager {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Persisted session, or `None` when either half is missing, blank or
    /// unparsable. Any partial or corrupt state is cleared on the way out.
    pub fn load(&self) -> Result<Option<Session>, AppError> {
        let token = self.storage.get_item(TOKEN_KEY)?;
        let user = self.storage.get_item(USER_KEY)?;

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) if !token.trim().is_empty() && !user.trim().is_empty() => {
                (token, user)
            }
            (None, None) => {
                debug!("No persisted session");
                return Ok(None);
            }
            _ => {
                warn!("Persisted session is incomplete, clearing it");
                self.clear()?;
                return Ok(None);
            }
        };

        match serde_json::from_str::<User>(&user) {
            Ok(user) => Ok(Some(Session::new(token, user))),
            Err(e) => {
                warn!("Persisted user profile is corrupt, clearing session: {}", e);
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Write token and profile together.
    pub fn save(&self, session: &Session) -> Result<(), AppError> {
        let user = serde_json::to_string(&session.user)?;
        self.storage
            .set_items(&[(TOKEN_KEY, session.token.as_str()), (USER_KEY, user.as_str())])?;
        info!("Session saved for user {} ({})", session.user.id, session.user.role);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), AppError> {
        self.storage.remove_items(&[TOKEN_KEY, USER_KEY])?;
        debug!("Session cleared");
        Ok(())
    }
}
