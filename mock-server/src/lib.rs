use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Body of create and update. Any `id` in it is ignored.
#[derive(Deserialize)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl UserInput {
    fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: Option<String>,
}

/// The single account the server accepts.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "password".to_string(),
        }
    }
}

impl Credentials {
    /// `MOCK_USERNAME` / `MOCK_PASSWORD`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            username: std::env::var("MOCK_USERNAME").unwrap_or(defaults.username),
            password: std::env::var("MOCK_PASSWORD").unwrap_or(defaults.password),
        }
    }
}

#[derive(Default)]
struct Store {
    users: BTreeMap<i64, User>,
    next_id: i64,
    tokens: HashSet<String>,
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<Store>>,
    credentials: Arc<Credentials>,
}

impl AppState {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store {
                next_id: 1,
                ..Store::default()
            })),
            credentials: Arc::new(credentials),
        }
    }

    /// Mint a valid bearer token without going through `/auth/login`.
    pub async fn issue_token(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.store.write().await.tokens.insert(token.clone());
        token
    }

    /// Invalidate every token, as if all sessions expired server-side.
    pub async fn revoke_tokens(&self) {
        self.store.write().await.tokens.clear();
    }

    async fn authorize(&self, headers: &HeaderMap) -> Result<(), StatusCode> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;
        if self.store.read().await.tokens.contains(token) {
            Ok(())
        } else {
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub fn app() -> Router {
    app_with_state(AppState::new(Credentials::default()))
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .with_state(state)
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    if input.username != state.credentials.username || input.password != state.credentials.password {
        warn!(username = %input.username, "rejected login");
        return Err(StatusCode::UNAUTHORIZED);
    }
    let token = state.issue_token().await;
    info!(username = %input.username, "issued token");
    Ok(Json(LoginResponse {
        token,
        username: Some(input.username),
    }))
}

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, StatusCode> {
    state.authorize(&headers).await?;
    let store = state.store.read().await;
    Ok(Json(store.users.values().cloned().collect()))
}

async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<UserInput>,
) -> Result<(StatusCode, Json<User>), StatusCode> {
    state.authorize(&headers).await?;
    if !input.is_valid() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut store = state.store.write().await;
    let id = store.next_id;
    store.next_id += 1;
    let user = User {
        id,
        name: input.name,
        email: input.email,
        phone: input.phone,
    };
    store.users.insert(id, user.clone());
    info!(id, "created user");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<User>, StatusCode> {
    state.authorize(&headers).await?;
    let store = state.store.read().await;
    store.users.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<UserInput>,
) -> Result<Json<User>, StatusCode> {
    state.authorize(&headers).await?;
    if !input.is_valid() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut store = state.store.write().await;
    let user = store.users.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    user.name = input.name;
    user.email = input.email;
    user.phone = input.phone;
    Ok(Json(user.clone()))
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    state.authorize(&headers).await?;
    let mut store = state.store.write().await;
    store
        .users
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}
