//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, a
//! `has_id` flag instead of `Option<i64>`, and tagged enums with explicit
//! discriminants. Conversion functions live here to keep `lib.rs` focused on
//! the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::sync::Mutex;

use tokio::sync::broadcast;
use users_core::{ApiError, ErrorKind, HttpMethod, SessionEvent, TransportErrorKind};

/// Opaque handle to a `UserClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiUserClient {
    pub(crate) inner: users_core::UserClient,
    pub(crate) events: Mutex<broadcast::Receiver<SessionEvent>>,
}

impl FfiUserClient {
    pub(crate) fn new(base_url: &str) -> Self {
        let inner = users_core::UserClient::new(base_url);
        let events = Mutex::new(inner.session().subscribe());
        Self { inner, events }
    }
}

/// Convert to a C string, dropping interior NULs rather than failing.
pub(crate) fn to_c_string(s: String) -> *mut c_char {
    let c = CString::new(s).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    c.into_raw()
}

pub(crate) fn to_c_string_opt(s: Option<String>) -> *mut c_char {
    s.map(to_c_string).unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `users_build_*` functions. The C caller executes the request
/// and passes the response back through `users_parse_*`, or reports a
/// failed round-trip through `users_transport_failed`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: users_core::HttpRequest) -> *mut Self {
        let url = to_c_string(req.url);
        let body = to_c_string_opt(req.body);

        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: to_c_string(k),
                    value: to_c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url,
            headers,
            headers_len,
            body,
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing an HTTP request,
/// then passes a pointer to a `users_parse_*` function. The FFI layer reads
/// but does not free these fields. A null `body` is treated as empty.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

/// Why the host's round-trip produced no response.
#[repr(C)]
#[derive(Clone, Copy)]
pub enum FfiTransportErrorKind {
    NotConnected = 0,
    ConnectionLost = 1,
    DataNotAllowed = 2,
    Other = 3,
}

impl From<FfiTransportErrorKind> for TransportErrorKind {
    fn from(kind: FfiTransportErrorKind) -> Self {
        match kind {
            FfiTransportErrorKind::NotConnected => TransportErrorKind::NotConnected,
            FfiTransportErrorKind::ConnectionLost => TransportErrorKind::ConnectionLost,
            FfiTransportErrorKind::DataNotAllowed => TransportErrorKind::DataNotAllowed,
            FfiTransportErrorKind::Other => TransportErrorKind::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// Session events
// ---------------------------------------------------------------------------

/// Result of `users_client_poll_session_event`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiSessionEvent {
    None = 0,
    LoggedOut = 1,
    Expired = 2,
}

impl From<SessionEvent> for FfiSessionEvent {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::LoggedOut => FfiSessionEvent::LoggedOut,
            SessionEvent::Expired => FfiSessionEvent::Expired,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiUserResult` and through `out_error`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    InvalidUrl = 1,
    InvalidRequest = 2,
    Offline = 3,
    Unauthorized = 4,
    Server = 5,
    Decoding = 6,
    Transport = 7,
    Panic = 8,
    NullArg = 9,
}

impl From<ErrorKind> for FfiErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidUrl => FfiErrorCode::InvalidUrl,
            ErrorKind::InvalidRequest => FfiErrorCode::InvalidRequest,
            ErrorKind::Offline => FfiErrorCode::Offline,
            ErrorKind::Unauthorized => FfiErrorCode::Unauthorized,
            ErrorKind::ServerError => FfiErrorCode::Server,
            ErrorKind::Decoding => FfiErrorCode::Decoding,
            ErrorKind::Transport => FfiErrorCode::Transport,
        }
    }
}

/// Tag that tells `users_free_result` what `FfiUserResult::data` points to.
#[repr(C)]
pub enum FfiDataTag {
    None = 0,
    User = 1,
    UserList = 2,
    Login = 3,
}

/// A single user exposed to C. `id` is meaningful only when `has_id`.
/// `phone` may be null.
#[repr(C)]
pub struct FfiUser {
    pub id: i64,
    pub has_id: bool,
    pub name: *mut c_char,
    pub email: *mut c_char,
    pub phone: *mut c_char,
}

impl FfiUser {
    fn from_core(user: users_core::User) -> Self {
        FfiUser {
            id: user.id.unwrap_or_default(),
            has_id: user.id.is_some(),
            name: to_c_string(user.name),
            email: to_c_string(user.email),
            phone: to_c_string_opt(user.phone),
        }
    }
}

/// A list of users exposed to C.
#[repr(C)]
pub struct FfiUserList {
    pub items: *mut FfiUser,
    pub len: u32,
}

/// Successful login. `username` may be null.
#[repr(C)]
pub struct FfiLogin {
    pub token: *mut c_char,
    pub username: *mut c_char,
}

/// Result envelope for all parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data`
/// points to the parsed payload (tagged by `data_tag`).
/// On failure `error_code` describes the category, `error_message` is a
/// human-readable C string, `http_status` is set for `Server` and
/// `Unauthorized`, and `data` is null.
#[repr(C)]
pub struct FfiUserResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_tag: FfiDataTag,
    pub data: *mut c_void,
}

impl FfiUserResult {
    fn ok(data_tag: FfiDataTag, data: *mut c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiUserResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            data_tag,
            data,
        }))
    }

    fn err(error_code: FfiErrorCode, http_status: u16, msg: String) -> *mut Self {
        Box::into_raw(Box::new(FfiUserResult {
            error_code,
            error_message: to_c_string(msg),
            http_status,
            data_tag: FfiDataTag::None,
            data: std::ptr::null_mut(),
        }))
    }

    /// Build a success result carrying a single `FfiUser`.
    pub(crate) fn ok_user(user: users_core::User) -> *mut Self {
        let ffi_user = Box::new(FfiUser::from_core(user));
        Self::ok(FfiDataTag::User, Box::into_raw(ffi_user) as *mut c_void)
    }

    /// Build a success result carrying a `FfiUserList`.
    pub(crate) fn ok_user_list(users: Vec<users_core::User>) -> *mut Self {
        let len = users.len() as u32;
        let items = if users.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_users: Box<[FfiUser]> = users.into_iter().map(FfiUser::from_core).collect();
            Box::into_raw(ffi_users) as *mut FfiUser
        };
        let ffi_list = Box::new(FfiUserList { items, len });
        Self::ok(FfiDataTag::UserList, Box::into_raw(ffi_list) as *mut c_void)
    }

    /// Build a success result carrying the login payload.
    pub(crate) fn ok_login(login: users_core::LoginResponse) -> *mut Self {
        let ffi_login = Box::new(FfiLogin {
            token: to_c_string(login.token),
            username: to_c_string_opt(login.username),
        });
        Self::ok(FfiDataTag::Login, Box::into_raw(ffi_login) as *mut c_void)
    }

    /// Build a success result with no data payload (e.g. delete).
    pub(crate) fn ok_empty() -> *mut Self {
        Self::ok(FfiDataTag::None, std::ptr::null_mut())
    }

    /// Build an error result from an `ApiError`.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let http_status = err.status().unwrap_or(0);
        Self::err(err.kind().into(), http_status, err.to_string())
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::err(FfiErrorCode::NullArg, 0, format!("null argument: {name}"))
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::err(FfiErrorCode::Panic, 0, msg.to_string())
    }
}

/// Free the C-string fields of an `FfiUser` (but not the struct itself).
pub(crate) fn free_ffi_user_fields(user: &FfiUser) {
    for s in [user.name, user.email, user.phone] {
        if !s.is_null() {
            drop(unsafe { CString::from_raw(s) });
        }
    }
}
