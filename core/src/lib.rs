//! API client core for the users service.
//!
//! # Overview
//! `UserClient` builds `HttpRequest` values and interprets `HttpResponse`
//! values without touching the network (host-does-IO pattern), so a mobile
//! host can run the round-trip itself through the FFI crate.
//! `UserApiClient` drives the same builder over an async `Transport` for
//! Rust callers.
//!
//! # Design
//! - A `Session` (optional bearer token) is owned by the client and shared by
//!   handle. Login sets it; logout and any 401 clear it and publish a
//!   `SessionEvent` to every subscriber.
//! - Every failure maps onto one `ApiError` variant; `ServerError` carries
//!   the status code.
//! - Types use owned `String` / `Vec` fields to simplify FFI mapping.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;

pub use api::UserApiClient;
pub use client::UserClient;
pub use config::ClientConfig;
pub use error::{ApiError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse, TransportError, TransportErrorKind};
pub use session::{FileStore, MemoryStore, Session, SessionEvent, SessionStore, StoreError};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::Transport;
pub use types::{LoginCredentials, LoginResponse, User};
