//! Domain DTOs for the users API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently.
//! Integration tests catch any schema drift between the two crates.
//!
//! A `User` without an `id` is a record the server has not created yet. The
//! server assigns identity, so the client never asks it to honor an `id` on
//! create.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A user record as exchanged with the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl User {
    /// A pending record with no server-assigned id.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Reject records the server would refuse anyway: `name` and `email`
    /// must be non-empty.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::InvalidRequest("name must not be empty".to_string()));
        }
        if self.email.trim().is_empty() {
            return Err(ApiError::InvalidRequest("email must not be empty".to_string()));
        }
        Ok(())
    }

    /// Copy of this record with `id` cleared, used as the create payload.
    pub(crate) fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }
}

/// Credentials for `POST /auth/login`. Never persisted.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful login payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_null_optionals() {
        let user = User::new("A", "a@x.com");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json["id"].is_null());
        assert_eq!(json["name"], "A");
        assert_eq!(json["email"], "a@x.com");
        assert!(json["phone"].is_null());
    }

    #[test]
    fn user_accepts_missing_optionals() {
        let user: User = serde_json::from_str(r#"{"name":"B","email":"b@x.com"}"#).unwrap();
        assert_eq!(user.id, None);
        assert_eq!(user.phone, None);
    }

    #[test]
    fn user_rejects_missing_email() {
        let result: Result<User, _> = serde_json::from_str(r#"{"id":1,"name":"B"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_blank_fields() {
        assert!(matches!(
            User::new(" ", "a@x.com").validate(),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            User::new("A", "").validate(),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(User::new("A", "a@x.com").validate().is_ok());
    }

    #[test]
    fn without_id_clears_only_id() {
        let user = User {
            id: Some(9),
            ..User::new("A", "a@x.com").with_phone("555")
        };
        let pending = user.without_id();
        assert_eq!(pending.id, None);
        assert_eq!(pending.phone.as_deref(), Some("555"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = LoginCredentials::new("admin", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn login_response_username_is_optional() {
        let resp: LoginResponse = serde_json::from_str(r#"{"token":"abc"}"#).unwrap();
        assert_eq!(resp.token, "abc");
        assert_eq!(resp.username, None);
    }
}
