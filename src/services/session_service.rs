//! The signed-in user, restored across restarts from the session pointer.
//!
//! The pointer only names a user id. Role checks always consult the
//! `DataService`, so there is exactly one answer to "is this an admin".

use std::sync::Arc;

use crate::{
    db::{KeyValueStore, keys},
    error::{AppError, AppResult},
    models::{Session, User, UserPatch, UserProfile},
    services::data_service::DataService,
};

pub struct AuthSession {
    data: Arc<DataService>,
    storage: Arc<dyn KeyValueStore>,
    user: Option<User>,
    session: Option<Session>,
}

impl AuthSession {
    /// Restore from the pointer kept in the façade's own storage.
    pub fn restore(data: Arc<DataService>) -> Self {
        let storage = data.storage();
        Self::restore_from(data, storage)
    }

    /// Restore from a pointer kept in a separate store.
    pub fn restore_from(data: Arc<DataService>, storage: Arc<dyn KeyValueStore>) -> Self {
        let mut auth = Self {
            data,
            storage,
            user: None,
            session: None,
        };

        let Some(session) = auth.read_pointer() else {
            return auth;
        };
        match auth.data.get_user(session.user_id) {
            Some(user) => {
                tracing::debug!(user_id = user.id, "session restored");
                auth.user = Some(user);
                auth.session = Some(session);
            }
            None => {
                tracing::info!(user_id = session.user_id, "session names an unknown user; clearing");
                auth.clear_pointer();
            }
        }
        auth
    }

    fn read_pointer(&mut self) -> Option<Session> {
        let raw = match self.storage.get(keys::SESSION) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::error!(error = ?err, "failed to read session pointer");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!(error = %err, "session pointer is corrupt; clearing");
                self.clear_pointer();
                None
            }
        }
    }

    fn clear_pointer(&self) {
        if let Err(err) = self.storage.remove(keys::SESSION) {
            tracing::error!(error = ?err, "failed to clear session pointer");
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.user.as_ref().map(User::profile)
    }

    pub fn session(&self) -> Option<Session> {
        self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user
            .as_ref()
            .and_then(|user| self.data.get_user(user.id))
            .is_some_and(|user| user.is_admin())
    }

    pub fn sign_in(&mut self, identifier: &str, password: &str) -> AppResult<UserProfile> {
        let user = self
            .data
            .authenticate(identifier, password)
            .ok_or(AppError::InvalidCredentials)?;

        let session = Session::start(user.id);
        match serde_json::to_string(&session) {
            Ok(raw) => {
                if let Err(err) = self.storage.set(keys::SESSION, &raw) {
                    tracing::error!(error = ?err, "failed to persist session pointer");
                }
            }
            Err(err) => tracing::error!(error = %err, "failed to encode session pointer"),
        }

        tracing::info!(user_id = user.id, "signed in");
        let profile = user.profile();
        self.user = Some(user);
        self.session = Some(session);
        Ok(profile)
    }

    /// Forget the user. The in-memory state is always cleared; the error
    /// reports a pointer that could not be removed from storage.
    pub fn sign_out(&mut self) -> AppResult<()> {
        if let Some(user) = self.user.take() {
            tracing::info!(user_id = user.id, "signed out");
        }
        self.session = None;
        self.storage.remove(keys::SESSION)
    }

    pub fn update_profile(&mut self, patch: UserPatch) -> AppResult<UserProfile> {
        let user_id = self.user.as_ref().ok_or(AppError::Unauthorized)?.id;
        let updated = self.data.update_user(user_id, patch).ok_or(AppError::NotFound)?;
        let profile = updated.profile();
        self.user = Some(updated);
        Ok(profile)
    }

    /// Re-read the user from the store, signing out if it has been removed.
    pub fn refresh(&mut self) {
        let Some(user_id) = self.user.as_ref().map(|u| u.id) else {
            return;
        };
        match self.data.get_user(user_id) {
            Some(user) => self.user = Some(user),
            None => {
                if let Err(err) = self.sign_out() {
                    tracing::error!(error = ?err, "failed to clear session pointer");
                }
            }
        }
    }
}
