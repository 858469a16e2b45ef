//! Bearer-token session shared by every call a client makes.
//!
//! # Design
//! `Session` is a cheap-to-clone handle owned by the client and injectable
//! into anything else that needs to observe login state. The token is either
//! absent or present: `establish` (login) makes it present, `end` (logout or
//! any 401) makes it absent. Writes are last-write-wins with no
//! compare-and-swap.
//!
//! Ending a session publishes a `SessionEvent` on a broadcast channel; any
//! number of subscribers can listen. Establishing one publishes nothing.
//!
//! Persistence goes through a `SessionStore`. Store failures are logged and
//! swallowed: the in-memory token stays authoritative for the process.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Key under which `FileStore` keeps the token.
pub const TOKEN_KEY: &str = "authToken";

const EVENT_CAPACITY: usize = 16;

/// Emitted when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user logged out explicitly.
    LoggedOut,
    /// The server answered 401; the token is no longer valid.
    Expired,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store is corrupt: {0}")]
    Format(#[from] serde_json::Error),
}

/// Durable storage for the session token.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, StoreError>;
    fn save(&self, token: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store, mostly for tests and hosts that keep the token
/// elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    token: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.token.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON key-value file holding the token under [`TOKEN_KEY`].
///
/// Other keys in the file are preserved across saves and clears.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/users-client/session.json`, if the platform has a data dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("users-client").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, serde_json::Value>, StoreError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_map(&self, map: &HashMap<String, serde_json::Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        let map = self.read_map()?;
        Ok(map
            .get(TOKEN_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        let mut map = self.read_map()?;
        map.insert(TOKEN_KEY.to_string(), serde_json::Value::String(token.to_string()));
        self.write_map(&map)
    }

    fn clear(&self) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut map = self.read_map()?;
        if map.remove(TOKEN_KEY).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

struct Inner {
    token: RwLock<Option<String>>,
    store: Option<Arc<dyn SessionStore>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Shared login state: an optional bearer token plus its event channel.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// An absent, unpersisted session.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// A session backed by `store`, restored from whatever it holds.
    pub fn with_store(store: Arc<dyn SessionStore>) -> Self {
        let token = match store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "failed to restore session; starting logged out");
                None
            }
        };
        Self::build(token, Some(store))
    }

    fn build(token: Option<String>, store: Option<Arc<dyn SessionStore>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                token: RwLock::new(token),
                store,
                events,
            }),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Receive every `SessionEvent` published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Make `token` the current session and persist it.
    ///
    /// Memory is updated before the store, same as `end`.
    pub fn establish(&self, token: String) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        if let Some(store) = &self.inner.store {
            if let Err(e) = store.save(&token) {
                warn!(error = %e, "failed to persist session token");
            }
        }
        info!("session established");
    }

    /// Drop the current token, persist the absence, and publish `event`.
    ///
    /// Publishes even when no token was held, so every 401 is observable.
    pub fn end(&self, event: SessionEvent) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        if let Some(store) = &self.inner.store {
            if let Err(e) = store.clear() {
                warn!(error = %e, "failed to clear persisted session token");
            }
        }
        match event {
            SessionEvent::LoggedOut => info!("session ended by logout"),
            SessionEvent::Expired => warn!("session expired"),
        }
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("persistent", &self.inner.store.is_some())
            .finish()
    }
}
