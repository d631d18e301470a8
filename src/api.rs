//! Wire types and HTTP client for the portal REST API.
//!
//! Every call has three observable outcomes: a decoded success body, a
//! server-reported failure carrying the body's `error` text, or a transport
//! failure where no response arrived at all.

use crate::session::Role;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Message shown for any request that never produced a response.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";

const LOGIN_FALLBACK: &str = "Login failed";
const RESET_FALLBACK: &str = "Failed to process request";
const REQUEST_FALLBACK: &str = "Request failed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response: connection refused, DNS failure, timeout.
    #[error("network error: {0}")]
    Network(String),
    /// HTTP 401. For an authenticated request this means the session is gone.
    #[error("{message}")]
    Unauthorized { message: String },
    /// Any other non-2xx response, or a 2xx body that failed to decode.
    #[error("{message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    /// Text suitable for an inline form message
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            ApiError::Unauthorized { message } | ApiError::Server { message, .. } => {
                message.clone()
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// A user as the backend serializes it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub assigned_client: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub user: UserRecord,
    /// Cookie-session deployments return no token; the agent's cookie store carries it.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    user: UserRecord,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub username_or_email: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordResponse {
    pub user_info: UserInfo,
    pub admin_message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Trait for the portal backend to allow mocking and abstraction
pub trait PortalApi: Send + Sync {
    fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError>;
    fn logout(&self, token: Option<&str>) -> Result<(), ApiError>;
    fn me(&self, token: Option<&str>) -> Result<UserRecord, ApiError>;
    fn forgot_password(&self, identifier: &str) -> Result<ForgotPasswordResponse, ApiError>;
    /// GET an arbitrary JSON resource under the API root, e.g. `/api/sops`
    fn get_json(&self, path: &str, token: Option<&str>) -> Result<Value, ApiError>;
}

/// Build the error for a non-2xx response from its status and raw body.
pub fn classify_status(status: u16, body: &str, fallback: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());

    if status == 401 {
        ApiError::Unauthorized { message }
    } else {
        ApiError::Server { status, message }
    }
}

pub struct HttpClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: &str, path: &str, token: Option<&str>) -> ureq::Request {
        let mut req = self
            .agent
            .request(method, &self.url(path))
            .set("Accept", "application/json");
        if let Some(token) = token {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }
        req
    }

    fn send(
        req: ureq::Request,
        body: Option<Value>,
        fallback: &str,
    ) -> Result<ureq::Response, ApiError> {
        let resp = match body {
            Some(body) => req
                .set("Content-Type", "application/json")
                .send_json(body),
            None => req.call(),
        };

        match resp {
            Ok(r) => Ok(r),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(classify_status(code, &body, fallback))
            }
            Err(e) => Err(ApiError::Network(e.to_string())),
        }
    }

    fn decode<T: DeserializeOwned>(resp: ureq::Response) -> Result<T, ApiError> {
        let status = resp.status();
        resp.into_json().map_err(|e| ApiError::Server {
            status,
            message: format!("Unexpected response from server: {}", e),
        })
    }

    fn to_body<T: Serialize>(value: &T) -> Result<Value, ApiError> {
        serde_json::to_value(value).map_err(|e| ApiError::Network(e.to_string()))
    }
}

impl PortalApi for HttpClient {
    fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = Self::to_body(&LoginRequest { username, password })?;
        let resp = Self::send(
            self.request("POST", "/api/auth/login", None),
            Some(body),
            LOGIN_FALLBACK,
        )?;
        Self::decode(resp)
    }

    fn logout(&self, token: Option<&str>) -> Result<(), ApiError> {
        Self::send(
            self.request("POST", "/api/auth/logout", token),
            Some(Value::Object(Default::default())),
            REQUEST_FALLBACK,
        )?;
        Ok(())
    }

    fn me(&self, token: Option<&str>) -> Result<UserRecord, ApiError> {
        let resp = Self::send(
            self.request("GET", "/api/auth/me", token),
            None,
            REQUEST_FALLBACK,
        )?;
        let me: MeResponse = Self::decode(resp)?;
        Ok(me.user)
    }

    fn forgot_password(&self, identifier: &str) -> Result<ForgotPasswordResponse, ApiError> {
        let body = Self::to_body(&ForgotPasswordRequest {
            username_or_email: identifier,
        })?;
        let resp = Self::send(
            self.request("POST", "/api/auth/forgot-password", None),
            Some(body),
            RESET_FALLBACK,
        )?;
        Self::decode(resp)
    }

    fn get_json(&self, path: &str, token: Option<&str>) -> Result<Value, ApiError> {
        let resp = Self::send(self.request("GET", path, token), None, REQUEST_FALLBACK)?;
        Self::decode(resp)
    }
}

/// Scripted in-memory backend shared by the unit tests.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub fn user(id: u64, username: &str, role: Role) -> UserRecord {
        UserRecord {
            id,
            username: username.to_string(),
            email: format!("{}@turmalabs.com", username),
            role,
            first_name: username.to_uppercase(),
            last_name: "Tester".to_string(),
            assigned_client: None,
            is_active: true,
            created_at: None,
            last_login: None,
        }
    }

    #[derive(Default)]
    pub struct MockApi {
        accounts: Vec<(String, UserRecord)>,
        resources: HashMap<String, Value>,
        pub offline: AtomicBool,
        pub expired: AtomicBool,
        /// `me` answers with a different account than the token's
        pub swapped: AtomicBool,
        pub login_calls: AtomicUsize,
        pub logout_calls: AtomicUsize,
        pub reset_calls: AtomicUsize,
        pub get_calls: AtomicUsize,
    }

    impl MockApi {
        /// Backend with `admin`/`admin123` and `maria`/`va123` plus a few resources
        pub fn seeded() -> Self {
            let mut api = MockApi::default();
            api.accounts
                .push(("admin123".to_string(), user(1, "admin", Role::Admin)));
            api.accounts
                .push(("va123".to_string(), user(2, "maria", Role::Member)));
            api.resources.insert(
                "/api/announcements/recent".to_string(),
                json!({ "announcements": [
                    { "title": "Holiday schedule", "is_pinned": true },
                    { "title": "New SOP for onboarding", "is_pinned": false }
                ]}),
            );
            api.resources.insert(
                "/api/sops".to_string(),
                json!({ "sops": [{ "title": "Inbox triage", "category": "Email" }] }),
            );
            api.resources.insert(
                "/api/time-logs".to_string(),
                json!({ "time_logs": [
                    { "date": "2024-05-02", "clock_in": "2024-05-02T09:00:00",
                      "clock_out": "2024-05-02T17:30:00", "total_hours": 8.5 }
                ]}),
            );
            api.resources.insert(
                "/api/users".to_string(),
                json!({ "users": [
                    { "username": "admin", "role": "admin", "first_name": "Admin",
                      "last_name": "User", "is_active": true },
                    { "username": "maria", "role": "va", "first_name": "Maria",
                      "last_name": "Santos", "is_active": true }
                ]}),
            );
            api
        }

        pub fn with_resource(mut self, path: &str, body: Value) -> Self {
            self.resources.insert(path.to_string(), body);
            self
        }

        fn check_online(&self) -> Result<(), ApiError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(ApiError::Network("connection refused".to_string()))
            } else {
                Ok(())
            }
        }

        fn check_session(&self) -> Result<(), ApiError> {
            if self.expired.load(Ordering::SeqCst) {
                Err(ApiError::Unauthorized {
                    message: "Authentication required".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl PortalApi for MockApi {
        fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            self.accounts
                .iter()
                .find(|(pw, u)| u.username == username && pw == password)
                .map(|(_, u)| LoginResponse {
                    message: Some("Login successful".to_string()),
                    user: u.clone(),
                    token: Some(format!("token-{}", u.id)),
                })
                .ok_or_else(|| ApiError::Unauthorized {
                    message: "Invalid credentials".to_string(),
                })
        }

        fn logout(&self, _token: Option<&str>) -> Result<(), ApiError> {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            self.check_online()
        }

        fn me(&self, token: Option<&str>) -> Result<UserRecord, ApiError> {
            self.check_online()?;
            self.check_session()?;
            if self.swapped.load(Ordering::SeqCst) {
                return Ok(user(99, "someone", Role::Member));
            }
            self.accounts
                .iter()
                .map(|(_, u)| u)
                .find(|u| token == Some(format!("token-{}", u.id).as_str()))
                .cloned()
                .ok_or_else(|| ApiError::Server {
                    status: 404,
                    message: "User not found".to_string(),
                })
        }

        fn forgot_password(&self, identifier: &str) -> Result<ForgotPasswordResponse, ApiError> {
            self.reset_calls.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            let (_, u) = self
                .accounts
                .iter()
                .find(|(_, u)| u.username == identifier || u.email == identifier)
                .ok_or_else(|| ApiError::Server {
                    status: 404,
                    message: "User not found".to_string(),
                })?;
            Ok(ForgotPasswordResponse {
                user_info: UserInfo {
                    first_name: u.first_name.clone(),
                    last_name: u.last_name.clone(),
                    username: u.username.clone(),
                    email: u.email.clone(),
                },
                admin_message: format!(
                    "New temporary password for {} {} ({}): Tmp12345abcd",
                    u.first_name, u.last_name, u.username
                ),
            })
        }

        fn get_json(&self, path: &str, _token: Option<&str>) -> Result<Value, ApiError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            self.check_session()?;
            self.resources
                .get(path)
                .cloned()
                .ok_or_else(|| ApiError::Server {
                    status: 404,
                    message: "Not found".to_string(),
                })
        }
    }
}
