//! Session store: the single owner of "who is logged in and with what role".
//!
//! Consumers read through [`SessionStore::current_session`]; only
//! `apply_login`, `logout` and `force_logout` mutate it.

use crate::api::{
    ApiError, ForgotPasswordResponse, LoginResponse, PortalApi, UserInfo, UserRecord,
};
use crate::error::PortalError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message shown when the backend rejects an authenticated request
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    Member,
    Admin,
}

impl From<String> for Role {
    /// Anything other than "admin" maps to the least privileged role.
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Member
        }
    }
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: u64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub auth_token: Option<String>,
}

impl Session {
    pub fn from_login(resp: LoginResponse) -> Self {
        let mut session = Self::from_user(&resp.user, resp.token);
        session.auth_token = session.auth_token.filter(|t| !t.is_empty());
        session
    }

    fn from_user(user: &UserRecord, auth_token: Option<String>) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            display_name: display_name(&user.first_name, &user.last_name, &user.username),
            email: user.email.clone(),
            role: user.role,
            auth_token,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

fn display_name(first: &str, last: &str, username: &str) -> String {
    let name = format!("{} {}", first.trim(), last.trim());
    let name = name.trim();
    if name.is_empty() {
        username.to_string()
    } else {
        name.to_string()
    }
}

/// Successful password reset as shown to the requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetResult {
    pub user_info: UserInfo,
    pub admin_message: String,
}

impl ResetResult {
    pub fn full_name(&self) -> String {
        display_name(
            &self.user_info.first_name,
            &self.user_info.last_name,
            &self.user_info.username,
        )
    }
}

/// Reject empty credentials before anything goes on the wire
pub fn validate_credentials(username: &str, password: &str) -> Result<(), PortalError> {
    if username.trim().is_empty() {
        return Err(PortalError::Validation("Username is required".to_string()));
    }
    if password.is_empty() {
        return Err(PortalError::Validation("Password is required".to_string()));
    }
    Ok(())
}

pub fn validate_identifier(identifier: &str) -> Result<(), PortalError> {
    if identifier.trim().is_empty() {
        return Err(PortalError::Validation(
            "Username or email is required".to_string(),
        ));
    }
    Ok(())
}

pub struct SessionStore {
    api: Arc<dyn PortalApi>,
    session: Option<Session>,
    error: Option<String>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn PortalApi>) -> Self {
        Self {
            api,
            session: None,
            error: None,
        }
    }

    /// Handle to the backend for work dispatched off the interaction thread
    pub fn api(&self) -> Arc<dyn PortalApi> {
        Arc::clone(&self.api)
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Last user-visible error, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Validate credentials and build the request to run off the interaction
    /// thread. Nothing is sent when validation fails.
    pub fn login_job(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<impl FnOnce() -> Result<LoginResponse, ApiError> + Send + 'static, PortalError>
    {
        validate_credentials(username, password)?;
        self.clear_error();
        let api = self.api();
        let username = username.trim().to_string();
        let password = password.to_string();
        Ok(move || api.login(&username, &password))
    }

    /// Apply a completed login request. On failure any prior session stays.
    pub fn apply_login(
        &mut self,
        outcome: Result<LoginResponse, ApiError>,
    ) -> Result<&Session, PortalError> {
        match outcome {
            Ok(resp) => {
                self.error = None;
                Ok(self.session.insert(Session::from_login(resp)))
            }
            Err(err) => {
                let err = PortalError::from(err);
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// User-initiated logout. Returns the cleared session so the caller can
    /// notify the backend.
    pub fn logout(&mut self) -> Option<Session> {
        self.error = None;
        self.session.take()
    }

    /// System-initiated logout after the backend rejected the session.
    pub fn force_logout(&mut self) -> Option<Session> {
        let previous = self.session.take();
        if previous.is_some() {
            self.error = Some(SESSION_EXPIRED_MESSAGE.to_string());
        }
        previous
    }

    /// Inspect the failure of an authenticated request. A 401 ends the
    /// session; returns true when that happened.
    pub fn observe_failure(&mut self, err: &ApiError) -> bool {
        if err.is_unauthorized() && self.session.is_some() {
            self.force_logout();
            true
        } else {
            false
        }
    }

    /// Refresh identity fields from the server's view of the current user.
    /// The token is kept; a different user id is treated as a lost session.
    pub fn refresh_user(&mut self, user: &UserRecord) -> Option<&Session> {
        let token = match &self.session {
            Some(s) if s.user_id == user.id => s.auth_token.clone(),
            Some(_) => {
                self.force_logout();
                return None;
            }
            None => return None,
        };
        self.session = Some(Session::from_user(user, token));
        self.session.as_ref()
    }

    /// Validate the identifier and build the reset request. Never touches
    /// the session.
    pub fn reset_job(
        &self,
        identifier: &str,
    ) -> Result<
        impl FnOnce() -> Result<ForgotPasswordResponse, ApiError> + Send + 'static,
        PortalError,
    > {
        validate_identifier(identifier)?;
        let api = self.api();
        let identifier = identifier.trim().to_string();
        Ok(move || api.forgot_password(&identifier))
    }

    /// Map a completed reset request to what the dialog shows.
    pub fn apply_reset(
        outcome: Result<ForgotPasswordResponse, ApiError>,
    ) -> Result<ResetResult, PortalError> {
        let resp = outcome?;
        Ok(ResetResult {
            user_info: resp.user_info,
            admin_message: resp.admin_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{user, MockApi};
    use std::sync::atomic::Ordering;

    fn store() -> (Arc<MockApi>, SessionStore) {
        let api = Arc::new(MockApi::seeded());
        let store = SessionStore::new(api.clone());
        (api, store)
    }

    fn login<'a>(
        store: &'a mut SessionStore,
        username: &str,
        password: &str,
    ) -> Result<&'a Session, PortalError> {
        let job = store.login_job(username, password)?;
        store.apply_login(job())
    }

    fn reset(store: &SessionStore, identifier: &str) -> Result<ResetResult, PortalError> {
        let job = store.reset_job(identifier)?;
        SessionStore::apply_reset(job())
    }

    #[test]
    fn test_role_from_wire() {
        assert_eq!(Role::from("admin".to_string()), Role::Admin);
        assert_eq!(Role::from("ADMIN".to_string()), Role::Admin);
        assert_eq!(Role::from("va".to_string()), Role::Member);
        assert_eq!(Role::from("member".to_string()), Role::Member);
        assert_eq!(Role::from("superuser".to_string()), Role::Member);

        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Member).unwrap(), "\"member\"");
    }

    #[test]
    fn test_login_success_creates_session() {
        let (_, mut store) = store();
        assert!(!store.is_authenticated());

        let session = login(&mut store, "maria", "va123").unwrap();
        assert_eq!(session.username, "maria");
        assert_eq!(session.role, Role::Member);
        assert_eq!(session.display_name, "MARIA Tester");
        assert_eq!(session.token(), Some("token-2"));
        assert!(store.is_authenticated());
        assert!(store.error().is_none());
    }

    #[test]
    fn test_login_failure_keeps_prior_session() {
        let (_, mut store) = store();
        login(&mut store, "admin", "admin123").unwrap();

        let err = login(&mut store, "admin", "wrong").unwrap_err();
        assert_eq!(err, PortalError::Auth("Invalid credentials".to_string()));
        assert_eq!(store.error(), Some("Invalid credentials"));
        assert_eq!(store.current_session().unwrap().username, "admin");
    }

    #[test]
    fn test_login_network_failure_message() {
        let (api, mut store) = store();
        api.offline.store(true, Ordering::SeqCst);

        let err = login(&mut store, "maria", "va123").unwrap_err();
        assert_eq!(err.kind(), "network");
        assert_eq!(store.error(), Some("Network error. Please try again."));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_login_validation_sends_nothing() {
        let (api, mut store) = store();
        assert!(matches!(
            login(&mut store, "  ", "pw"),
            Err(PortalError::Validation(_))
        ));
        assert!(matches!(
            login(&mut store, "maria", ""),
            Err(PortalError::Validation(_))
        ));
        assert_eq!(api.login_calls.load(Ordering::SeqCst), 0);
        assert!(store.error().is_none());
    }

    #[test]
    fn test_logout_clears_session() {
        let (_, mut store) = store();
        login(&mut store, "maria", "va123").unwrap();
        let previous = store.logout().unwrap();
        assert_eq!(previous.username, "maria");
        assert!(store.current_session().is_none());
        assert!(store.logout().is_none());
    }

    #[test]
    fn test_observe_unauthorized_forces_logout() {
        let (_, mut store) = store();
        login(&mut store, "maria", "va123").unwrap();

        let not_found = ApiError::Server {
            status: 404,
            message: "Not found".to_string(),
        };
        assert!(!store.observe_failure(&not_found));
        assert!(store.is_authenticated());

        let expired = ApiError::Unauthorized {
            message: "Authentication required".to_string(),
        };
        assert!(store.observe_failure(&expired));
        assert!(!store.is_authenticated());
        assert_eq!(store.error(), Some(SESSION_EXPIRED_MESSAGE));
    }

    #[test]
    fn test_refresh_user_updates_role() {
        let (_, mut store) = store();
        login(&mut store, "maria", "va123").unwrap();

        let promoted = user(2, "maria", Role::Admin);
        let session = store.refresh_user(&promoted).unwrap();
        assert_eq!(session.role, Role::Admin);
        assert_eq!(session.token(), Some("token-2"));

        let stranger = user(9, "someone", Role::Admin);
        assert!(store.refresh_user(&stranger).is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_password_reset_unknown_user() {
        let (_, mut store) = store();
        login(&mut store, "maria", "va123").unwrap();
        let before = store.current_session().cloned();

        let err = reset(&store, "nonexistent_user").unwrap_err();
        assert_eq!(err.to_string(), "User not found");
        assert_eq!(store.current_session().cloned(), before);
    }

    #[test]
    fn test_password_reset_existing_account() {
        let (_, store) = store();
        let result = reset(&store, "maria@turmalabs.com").unwrap();
        assert_eq!(result.user_info.username, "maria");
        assert!(!result.admin_message.is_empty());
        assert_eq!(result.full_name(), "MARIA Tester");
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(display_name("", " ", "ghost"), "ghost");
        assert_eq!(display_name("Ana", "", "ana"), "Ana");
    }
}
