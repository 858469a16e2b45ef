//! Async users API client.
//!
//! `UserApiClient` pairs a `UserClient` with a `Transport` and runs each
//! operation end-to-end: build, execute, interpret. Local failures
//! (`InvalidUrl`, `InvalidRequest`) are returned before the transport is
//! touched. Calls are independent; nothing orders or serializes them.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::client::UserClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::session::{Session, SessionEvent};
use crate::transport::Transport;
use crate::types::{LoginCredentials, LoginResponse, User};

#[derive(Clone)]
pub struct UserApiClient {
    client: UserClient,
    transport: Arc<dyn Transport>,
}

impl UserApiClient {
    pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self::with_session(base_url, Session::new(), transport)
    }

    pub fn with_session(base_url: &str, session: Session, transport: Arc<dyn Transport>) -> Self {
        Self {
            client: UserClient::with_session(base_url, session),
            transport,
        }
    }

    /// Client over `ReqwestTransport`, persisting the session to the
    /// configured file when there is one.
    #[cfg(feature = "reqwest")]
    pub fn from_config(config: &crate::config::ClientConfig) -> Result<Self, ApiError> {
        use crate::session::FileStore;
        use crate::transport::ReqwestTransport;

        let transport = ReqwestTransport::new(config.timeout()).map_err(ApiError::from)?;
        let session = match &config.session_file {
            Some(path) => Session::with_store(Arc::new(FileStore::new(path))),
            None => Session::new(),
        };
        Ok(Self::with_session(&config.base_url, session, Arc::new(transport)))
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    /// Session-ended notifications: explicit logout and every 401.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.client.session().subscribe()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let credentials = LoginCredentials::new(username, password);
        let request = self.client.build_login(&credentials)?;
        let response = self.send(request).await?;
        let login = self.client.parse_login(response)?;
        info!(username, "logged in");
        Ok(login)
    }

    pub fn logout(&self) {
        self.client.logout();
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let request = self.client.build_list_users()?;
        let response = self.send(request).await?;
        self.client.parse_list_users(response)
    }

    pub async fn get_user(&self, id: i64) -> Result<User, ApiError> {
        let request = self.client.build_get_user(id)?;
        let response = self.send(request).await?;
        self.client.parse_get_user(response)
    }

    pub async fn create_user(&self, user: &User) -> Result<User, ApiError> {
        let request = self.client.build_create_user(user)?;
        let response = self.send(request).await?;
        self.client.parse_create_user(response)
    }

    /// Fails with `InvalidRequest` without any I/O when `user.id` is absent.
    pub async fn update_user(&self, user: &User) -> Result<User, ApiError> {
        let request = self.client.build_update_user(user)?;
        let response = self.send(request).await?;
        self.client.parse_update_user(response)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        let request = self.client.build_delete_user(id)?;
        let response = self.send(request).await?;
        self.client.parse_delete_user(response)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = request.method;
        let url = request.url.clone();
        self.transport.execute(request).await.map_err(|e| {
            debug!(%method, %url, error = %e, "request failed before a response arrived");
            ApiError::from(e)
        })
    }
}

impl fmt::Debug for UserApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserApiClient")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::http::{HttpMethod, TransportError, TransportErrorKind};

    type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

    /// Answers every request with `handler` and records what it saw.
    struct FakeTransport {
        handler: Handler,
        calls: AtomicUsize,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        fn new(
            handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                handler: Box::new(handler),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn status(status: u16) -> Arc<Self> {
            Self::new(move |_| Ok(HttpResponse::new(status, "")))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last(&self) -> HttpRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = (self.handler)(&request);
            self.seen.lock().unwrap().push(request);
            result
        }
    }

    const BASE: &str = "http://localhost:8080/api";

    fn api(transport: Arc<FakeTransport>) -> UserApiClient {
        UserApiClient::new(BASE, transport)
    }

    fn logged_in(transport: Arc<FakeTransport>) -> UserApiClient {
        let api = api(transport);
        api.session().establish("tok".to_string());
        api
    }

    fn stored(id: i64) -> User {
        User {
            id: Some(id),
            ..User::new("A", "a@x.com")
        }
    }

    #[tokio::test]
    async fn login_then_authenticated_call() {
        let transport = FakeTransport::new(|req| {
            if req.url.ends_with("/auth/login") {
                Ok(HttpResponse::new(200, r#"{"token":"fresh","username":"admin"}"#))
            } else if req.header("authorization") == Some("Bearer fresh") {
                Ok(HttpResponse::new(200, "[]"))
            } else {
                Ok(HttpResponse::new(401, ""))
            }
        });
        let api = api(transport.clone());

        let login = api.login("admin", "password").await.unwrap();
        assert_eq!(login.token, "fresh");
        assert!(api.session().is_authenticated());

        let users = api.list_users().await.unwrap();
        assert!(users.is_empty());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn login_rejected() {
        let transport = FakeTransport::status(401);
        let api = api(transport);
        let err = api.login("admin", "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(!api.session().is_authenticated());
    }

    #[tokio::test]
    async fn login_server_error() {
        let api = api(FakeTransport::status(502));
        let err = api.login("admin", "password").await.unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn update_without_id_never_hits_the_network() {
        let transport = FakeTransport::status(200);
        let api = logged_in(transport.clone());
        let err = api.update_user(&User::new("A", "a@x.com")).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_base_url_never_hits_the_network() {
        let transport = FakeTransport::status(200);
        let api = UserApiClient::new("::not a url::", transport.clone());
        assert!(matches!(api.list_users().await, Err(ApiError::InvalidUrl(_))));
        assert!(matches!(api.delete_user(1).await, Err(ApiError::InvalidUrl(_))));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn every_unauthorized_call_expires_the_session_once() {
        let transport = FakeTransport::status(401);
        let api = logged_in(transport.clone());
        let mut rx = api.subscribe();

        let results = [
            api.list_users().await.map(|_| ()),
            api.get_user(1).await.map(|_| ()),
            api.create_user(&User::new("A", "a@x.com")).await.map(|_| ()),
            api.update_user(&stored(1)).await.map(|_| ()),
            api.delete_user(1).await,
        ];
        for result in results {
            assert!(matches!(result, Err(ApiError::Unauthorized)));
        }
        assert!(!api.session().is_authenticated());

        for _ in 0..5 {
            assert_eq!(rx.try_recv().unwrap(), SessionEvent::Expired);
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn expiry_drops_the_token_from_later_requests() {
        let transport = FakeTransport::status(401);
        let api = logged_in(transport.clone());

        let _ = api.list_users().await;
        assert_eq!(transport.last().header("authorization"), Some("Bearer tok"));

        let _ = api.list_users().await;
        assert_eq!(transport.last().header("authorization"), None);
    }

    #[tokio::test]
    async fn offline_for_every_operation() {
        for kind in [
            TransportErrorKind::NotConnected,
            TransportErrorKind::ConnectionLost,
            TransportErrorKind::DataNotAllowed,
        ] {
            let transport = FakeTransport::new(move |_| Err(TransportError::new(kind, "no network")));
            let api = logged_in(transport);

            assert!(matches!(api.login("a", "b").await, Err(ApiError::Offline)));
            assert!(matches!(api.list_users().await, Err(ApiError::Offline)));
            assert!(matches!(api.get_user(1).await, Err(ApiError::Offline)));
            assert!(matches!(
                api.create_user(&User::new("A", "a@x.com")).await,
                Err(ApiError::Offline)
            ));
            assert!(matches!(api.update_user(&stored(1)).await, Err(ApiError::Offline)));
            assert!(matches!(api.delete_user(1).await, Err(ApiError::Offline)));
        }
    }

    #[tokio::test]
    async fn offline_leaves_the_session_alone() {
        let transport = FakeTransport::new(|_| {
            Err(TransportError::new(TransportErrorKind::NotConnected, "airplane mode"))
        });
        let api = logged_in(transport);
        let _ = api.list_users().await;
        assert!(api.session().is_authenticated());
    }

    #[tokio::test]
    async fn other_transport_failures_stay_distinct() {
        let transport =
            FakeTransport::new(|_| Err(TransportError::new(TransportErrorKind::Other, "timed out")));
        let api = logged_in(transport);
        let err = api.list_users().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(ref msg) if msg == "timed out"));
    }

    #[tokio::test]
    async fn get_user_server_error() {
        let transport = FakeTransport::status(500);
        let api = logged_in(transport.clone());
        let err = api.get_user(7).await.unwrap_err();
        assert!(matches!(err, ApiError::ServerError { status: 500, .. }));

        let req = transport.last();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8080/api/users/7");
    }

    #[tokio::test]
    async fn delete_missing_user() {
        let api = logged_in(FakeTransport::status(404));
        let err = api.delete_user(42).await.unwrap_err();
        assert!(matches!(err, ApiError::ServerError { status: 404, .. }));
    }

    #[tokio::test]
    async fn create_returns_server_assigned_id() {
        let transport = FakeTransport::new(|req| {
            let mut user: User = serde_json::from_str(req.body.as_deref().unwrap_or("")).unwrap();
            assert_eq!(user.id, None);
            user.id = Some(17);
            Ok(HttpResponse::new(201, serde_json::to_string(&user).unwrap()))
        });
        let api = logged_in(transport);

        let created = api.create_user(&User::new("A", "a@x.com")).await.unwrap();
        assert_eq!(created.id, Some(17));
        assert_eq!(created.name, "A");
        assert_eq!(created.email, "a@x.com");
    }

    #[tokio::test]
    async fn update_returns_server_record() {
        let transport = FakeTransport::new(|req| {
            assert_eq!(req.method, HttpMethod::Put);
            Ok(HttpResponse::new(200, req.body.clone().unwrap_or_default()))
        });
        let api = logged_in(transport);
        let updated = api.update_user(&stored(5)).await.unwrap();
        assert_eq!(updated, stored(5));
    }

    #[tokio::test]
    async fn logout_clears_and_notifies() {
        let api = logged_in(FakeTransport::status(200));
        let mut rx = api.subscribe();
        api.logout();
        assert!(!api.session().is_authenticated());
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::LoggedOut);
    }
}
