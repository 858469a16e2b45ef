//! HTTP request builder and response interpreter for the users API.
//!
//! # Design
//! `UserClient` holds a `base_url` and a shared `Session`. Each operation is
//! split into a `build_*` method that produces an `HttpRequest` and a
//! `parse_*` method that consumes an `HttpResponse`. Whoever executes the
//! round-trip sits between the two, which keeps this type free of I/O.
//!
//! The only side effects are on the session: `parse_login` establishes it,
//! and any 401 seen by a `parse_*` method ends it with
//! `SessionEvent::Expired` before returning `ApiError::Unauthorized`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::session::{Session, SessionEvent};
use crate::types::{LoginCredentials, LoginResponse, User};

const USERS: &str = "users";
const AUTH: &str = "auth";
const LOGIN: &str = "login";

/// Synchronous client for the users API that never touches the network.
#[derive(Debug, Clone)]
pub struct UserClient {
    base_url: String,
    session: Session,
}

impl UserClient {
    /// Client with a fresh in-memory session.
    ///
    /// `base_url` is not validated here; a malformed one surfaces as
    /// `ApiError::InvalidUrl` from every `build_*` call.
    pub fn new(base_url: &str) -> Self {
        Self::with_session(base_url, Session::new())
    }

    pub fn with_session(base_url: &str, session: Session) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// End the session and notify subscribers.
    pub fn logout(&self) {
        self.session.end(SessionEvent::LoggedOut);
    }

    pub fn build_login(&self, credentials: &LoginCredentials) -> Result<HttpRequest, ApiError> {
        if credentials.username.is_empty() || credentials.password.is_empty() {
            return Err(ApiError::InvalidRequest(
                "username and password are required".to_string(),
            ));
        }
        let body = encode(credentials)?;
        self.request(HttpMethod::Post, &[AUTH, LOGIN], Some(body), false)
    }

    pub fn build_list_users(&self) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &[USERS], None, true)
    }

    pub fn build_get_user(&self, id: i64) -> Result<HttpRequest, ApiError> {
        let id = id.to_string();
        self.request(HttpMethod::Get, &[USERS, id.as_str()], None, true)
    }

    /// Any `id` on `user` is dropped from the payload.
    pub fn build_create_user(&self, user: &User) -> Result<HttpRequest, ApiError> {
        user.validate()?;
        let body = encode(&user.without_id())?;
        self.request(HttpMethod::Post, &[USERS], Some(body), true)
    }

    pub fn build_update_user(&self, user: &User) -> Result<HttpRequest, ApiError> {
        let id = user
            .id
            .ok_or_else(|| ApiError::InvalidRequest("cannot update a user without an id".to_string()))?;
        user.validate()?;
        let body = encode(user)?;
        let id = id.to_string();
        self.request(HttpMethod::Put, &[USERS, id.as_str()], Some(body), true)
    }

    pub fn build_delete_user(&self, id: i64) -> Result<HttpRequest, ApiError> {
        let id = id.to_string();
        self.request(HttpMethod::Delete, &[USERS, id.as_str()], None, true)
    }

    /// On success the returned token becomes the current session. An empty
    /// token is a `Decoding` error and leaves the session untouched.
    pub fn parse_login(&self, response: HttpResponse) -> Result<LoginResponse, ApiError> {
        let login: LoginResponse = self.decode(response)?;
        if login.token.trim().is_empty() {
            return Err(ApiError::Decoding("login response has an empty token".to_string()));
        }
        self.session.establish(login.token.clone());
        Ok(login)
    }

    pub fn parse_list_users(&self, response: HttpResponse) -> Result<Vec<User>, ApiError> {
        self.decode(response)
    }

    pub fn parse_get_user(&self, response: HttpResponse) -> Result<User, ApiError> {
        self.decode(response)
    }

    /// The server must hand back the record with its assigned `id`.
    pub fn parse_create_user(&self, response: HttpResponse) -> Result<User, ApiError> {
        let user: User = self.decode(response)?;
        if user.id.is_none() {
            return Err(ApiError::Decoding("created user has no id".to_string()));
        }
        Ok(user)
    }

    pub fn parse_update_user(&self, response: HttpResponse) -> Result<User, ApiError> {
        self.decode(response)
    }

    /// Any 2xx counts; the body is ignored.
    pub fn parse_delete_user(&self, response: HttpResponse) -> Result<(), ApiError> {
        self.check_status(response).map(|_| ())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let invalid = |reason: &str| ApiError::InvalidUrl(format!("{}: {reason}", self.base_url));

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: HttpMethod,
        segments: &[&str],
        body: Option<String>,
        authenticated: bool,
    ) -> Result<HttpRequest, ApiError> {
        let url = self.endpoint(segments)?;
        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if authenticated {
            if let Some(token) = self.session.token() {
                headers.push(("authorization".to_string(), format!("Bearer {token}")));
            }
        }
        debug!(%method, %url, authenticated, "built request");
        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        })
    }

    /// Map non-success status codes to the appropriate `ApiError` variant.
    /// A 401 also ends the session.
    fn check_status(&self, response: HttpResponse) -> Result<HttpResponse, ApiError> {
        if response.is_success() {
            return Ok(response);
        }
        if response.status == 401 {
            self.session.end(SessionEvent::Expired);
            return Err(ApiError::Unauthorized);
        }
        Err(ApiError::ServerError {
            status: response.status,
            body: response.body,
        })
    }

    fn decode<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        let response = self.check_status(response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decoding(e.to_string()))
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}
