//! C-ABI wrapper around `users-core`.
//!
//! # Overview
//! Exposes the users API client through `extern "C"` functions so a mobile
//! host can build requests, run them on its own networking stack, and hand
//! the responses back for interpretation, without linking an async runtime.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Per-operation `users_build_*` / `users_parse_*` mirrors the core API
//!   1:1. Build functions return null on failure and report why through an
//!   optional `out_error`.
//! - A single `FfiUserResult` envelope with `FfiDataTag` + `void* data`
//!   conveys success payloads and errors uniformly.
//! - The client owns the session. A 401 seen by any `users_parse_*` call
//!   clears it; the host learns about it by polling
//!   `users_client_poll_session_event`.
//! - The C caller owns all returned pointers and must call the matching
//!   `users_free_*` function to release them.

pub mod types;


use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::PoisonError;

use tokio::sync::broadcast::error::TryRecvError;
use users_core::{
    ApiError, HttpRequest, HttpResponse, LoginCredentials, TransportError, User, UserClient,
};

use types::*;

/// Borrow a C string as UTF-8. `None` for null or invalid UTF-8.
fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn set_error(out_error: *mut FfiErrorCode, code: FfiErrorCode) {
    if !out_error.is_null() {
        unsafe { *out_error = code };
    }
}

/// Shared body of every `users_build_*` function.
fn build_with<F>(
    client: *const FfiUserClient,
    out_error: *mut FfiErrorCode,
    build: F,
) -> *mut FfiHttpRequest
where
    F: FnOnce(&UserClient) -> Result<HttpRequest, ApiError>,
{
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            set_error(out_error, FfiErrorCode::NullArg);
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match build(&client.inner) {
            Ok(req) => {
                set_error(out_error, FfiErrorCode::Ok);
                FfiHttpRequest::from_core(req)
            }
            Err(e) => {
                set_error(out_error, e.kind().into());
                std::ptr::null_mut()
            }
        }
    }))
    .unwrap_or_else(|_| {
        set_error(out_error, FfiErrorCode::Panic);
        std::ptr::null_mut()
    })
}

/// Shared body of every `users_parse_*` function.
fn parse_with<F>(
    client: *const FfiUserClient,
    response: *const FfiHttpResponse,
    context: &str,
    parse: F,
) -> *mut FfiUserResult
where
    F: FnOnce(&UserClient, HttpResponse) -> *mut FfiUserResult,
{
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiUserResult::null_arg("client");
        }
        if response.is_null() {
            return FfiUserResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        parse(&client.inner, ffi_response_to_core(resp))
    }))
    .unwrap_or_else(|_| FfiUserResult::panic(&format!("panic in {context}")))
}

fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(resp.body) }
            .to_string_lossy()
            .into_owned()
    };
    HttpResponse::new(resp.status, body)
}

/// Assemble a `User` from C arguments. Null `phone` means no phone; any
/// other argument that is not UTF-8 is an `InvalidRequest`.
fn user_from_args(
    id: Option<i64>,
    name: *const c_char,
    email: *const c_char,
    phone: *const c_char,
) -> Result<User, ApiError> {
    let name = read_str(name).ok_or_else(|| ApiError::InvalidRequest("name must be UTF-8".to_string()))?;
    let email =
        read_str(email).ok_or_else(|| ApiError::InvalidRequest("email must be UTF-8".to_string()))?;
    let phone = if phone.is_null() {
        None
    } else {
        let phone =
            read_str(phone).ok_or_else(|| ApiError::InvalidRequest("phone must be UTF-8".to_string()))?;
        Some(phone.to_string())
    };
    Ok(User {
        id,
        name: name.to_string(),
        email: email.to_string(),
        phone,
    })
}

// ---------------------------------------------------------------------------
// Client lifecycle and session
// ---------------------------------------------------------------------------

/// Create a new `UserClient` bound to `base_url`, e.g.
/// `http://192.168.0.101:8080/api`.
///
/// Returns null if `base_url` is null or if an internal panic occurs. A
/// malformed URL is accepted here and reported by every build call.
/// The caller must free the returned pointer with `users_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn users_client_new(base_url: *const c_char) -> *mut FfiUserClient {
    catch_unwind(|| {
        if base_url.is_null() {
            return std::ptr::null_mut();
        }
        let url = read_str(base_url).unwrap_or("");
        Box::into_raw(Box::new(FfiUserClient::new(url)))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a `UserClient` created by `users_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn users_client_free(client: *mut FfiUserClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

/// Restore a token the host persisted (e.g. in the keychain).
///
/// Returns false if either argument is null or `token` is empty.
#[unsafe(no_mangle)]
pub extern "C" fn users_client_set_token(client: *const FfiUserClient, token: *const c_char) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return false;
        }
        let client = unsafe { &*client };
        match read_str(token) {
            Some(token) if !token.is_empty() => {
                client.inner.session().establish(token.to_string());
                true
            }
            _ => false,
        }
    }))
    .unwrap_or(false)
}

/// Current session token, or null when logged out.
/// The caller must free a non-null result with `users_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn users_client_token(client: *const FfiUserClient) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        to_c_string_opt(client.inner.session().token())
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Clear the session. Publishes `LoggedOut` to the event queue.
#[unsafe(no_mangle)]
pub extern "C" fn users_client_logout(client: *const FfiUserClient) {
    if client.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let client = unsafe { &*client };
        client.inner.logout();
    }));
}

/// Pop the next session event, or `None` if nothing is pending.
///
/// Events are queued on logout and on every 401. Call until it returns
/// `None` to drain the queue.
#[unsafe(no_mangle)]
pub extern "C" fn users_client_poll_session_event(client: *const FfiUserClient) -> FfiSessionEvent {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiSessionEvent::None;
        }
        let client = unsafe { &*client };
        let mut events = client.events.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match events.try_recv() {
                Ok(event) => return event.into(),
                // Overflowed; older events are gone, keep reading the rest.
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return FfiSessionEvent::None,
            }
        }
    }))
    .unwrap_or(FfiSessionEvent::None)
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Build the login request. The session token is never attached.
///
/// Returns null on failure; `out_error` (may be null) receives the reason.
/// The caller must free the returned pointer with `users_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn users_build_login(
    client: *const FfiUserClient,
    username: *const c_char,
    password: *const c_char,
    out_error: *mut FfiErrorCode,
) -> *mut FfiHttpRequest {
    build_with(client, out_error, |c| {
        let credentials = LoginCredentials::new(read_str(username).unwrap_or(""), read_str(password).unwrap_or(""));
        c.build_login(&credentials)
    })
}

/// Build an HTTP request for listing all users.
#[unsafe(no_mangle)]
pub extern "C" fn users_build_list_users(
    client: *const FfiUserClient,
    out_error: *mut FfiErrorCode,
) -> *mut FfiHttpRequest {
    build_with(client, out_error, |c| c.build_list_users())
}

/// Build an HTTP request for fetching a single user by id.
#[unsafe(no_mangle)]
pub extern "C" fn users_build_get_user(
    client: *const FfiUserClient,
    id: i64,
    out_error: *mut FfiErrorCode,
) -> *mut FfiHttpRequest {
    build_with(client, out_error, |c| c.build_get_user(id))
}

/// Build an HTTP request for creating a user. `phone` may be null.
#[unsafe(no_mangle)]
pub extern "C" fn users_build_create_user(
    client: *const FfiUserClient,
    name: *const c_char,
    email: *const c_char,
    phone: *const c_char,
    out_error: *mut FfiErrorCode,
) -> *mut FfiHttpRequest {
    build_with(client, out_error, |c| {
        let user = user_from_args(None, name, email, phone)?;
        c.build_create_user(&user)
    })
}

/// Build an HTTP request replacing the user `id`.
///
/// Fails with `InvalidRequest` when `has_id` is false.
#[unsafe(no_mangle)]
pub extern "C" fn users_build_update_user(
    client: *const FfiUserClient,
    id: i64,
    has_id: bool,
    name: *const c_char,
    email: *const c_char,
    phone: *const c_char,
    out_error: *mut FfiErrorCode,
) -> *mut FfiHttpRequest {
    build_with(client, out_error, |c| {
        let user = user_from_args(has_id.then_some(id), name, email, phone)?;
        c.build_update_user(&user)
    })
}

/// Build an HTTP request for deleting a user by id.
#[unsafe(no_mangle)]
pub extern "C" fn users_build_delete_user(
    client: *const FfiUserClient,
    id: i64,
    out_error: *mut FfiErrorCode,
) -> *mut FfiHttpRequest {
    build_with(client, out_error, |c| c.build_delete_user(id))
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Parse the login response. On success the token becomes the session and
/// the result carries `data_tag = Login`.
#[unsafe(no_mangle)]
pub extern "C" fn users_parse_login(
    client: *const FfiUserClient,
    response: *const FfiHttpResponse,
) -> *mut FfiUserResult {
    parse_with(client, response, "users_parse_login", |c, resp| match c.parse_login(resp) {
        Ok(login) => FfiUserResult::ok_login(login),
        Err(e) => FfiUserResult::from_error(e),
    })
}

/// Parse a list-users response. Returns `data_tag = UserList` on success.
#[unsafe(no_mangle)]
pub extern "C" fn users_parse_list_users(
    client: *const FfiUserClient,
    response: *const FfiHttpResponse,
) -> *mut FfiUserResult {
    parse_with(client, response, "users_parse_list_users", |c, resp| {
        match c.parse_list_users(resp) {
            Ok(users) => FfiUserResult::ok_user_list(users),
            Err(e) => FfiUserResult::from_error(e),
        }
    })
}

/// Parse a get-user response. Returns `data_tag = User` on success.
#[unsafe(no_mangle)]
pub extern "C" fn users_parse_get_user(
    client: *const FfiUserClient,
    response: *const FfiHttpResponse,
) -> *mut FfiUserResult {
    parse_with(client, response, "users_parse_get_user", |c, resp| match c.parse_get_user(resp) {
        Ok(user) => FfiUserResult::ok_user(user),
        Err(e) => FfiUserResult::from_error(e),
    })
}

/// Parse a create-user response. Returns `data_tag = User` with `has_id` set.
#[unsafe(no_mangle)]
pub extern "C" fn users_parse_create_user(
    client: *const FfiUserClient,
    response: *const FfiHttpResponse,
) -> *mut FfiUserResult {
    parse_with(client, response, "users_parse_create_user", |c, resp| {
        match c.parse_create_user(resp) {
            Ok(user) => FfiUserResult::ok_user(user),
            Err(e) => FfiUserResult::from_error(e),
        }
    })
}

/// Parse an update-user response. Returns `data_tag = User` on success.
#[unsafe(no_mangle)]
pub extern "C" fn users_parse_update_user(
    client: *const FfiUserClient,
    response: *const FfiHttpResponse,
) -> *mut FfiUserResult {
    parse_with(client, response, "users_parse_update_user", |c, resp| {
        match c.parse_update_user(resp) {
            Ok(user) => FfiUserResult::ok_user(user),
            Err(e) => FfiUserResult::from_error(e),
        }
    })
}

/// Parse a delete-user response. Returns `data_tag = None` on success.
#[unsafe(no_mangle)]
pub extern "C" fn users_parse_delete_user(
    client: *const FfiUserClient,
    response: *const FfiHttpResponse,
) -> *mut FfiUserResult {
    parse_with(client, response, "users_parse_delete_user", |c, resp| {
        match c.parse_delete_user(resp) {
            Ok(()) => FfiUserResult::ok_empty(),
            Err(e) => FfiUserResult::from_error(e),
        }
    })
}

/// Report a round-trip that produced no response. Connectivity kinds map
/// to `Offline`, `Other` to `Transport`. `message` may be null.
#[unsafe(no_mangle)]
pub extern "C" fn users_transport_failed(
    kind: FfiTransportErrorKind,
    message: *const c_char,
) -> *mut FfiUserResult {
    catch_unwind(AssertUnwindSafe(|| {
        let message = read_str(message).unwrap_or("transport failure");
        FfiUserResult::from_error(ApiError::from(TransportError::new(kind.into(), message)))
    }))
    .unwrap_or_else(|_| FfiUserResult::panic("panic in users_transport_failed"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by any `users_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn users_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let req = unsafe { Box::from_raw(req) };
        if !req.url.is_null() {
            drop(unsafe { CString::from_raw(req.url) });
        }
        if !req.body.is_null() {
            drop(unsafe { CString::from_raw(req.body) });
        }
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                if !h.key.is_null() {
                    drop(unsafe { CString::from_raw(h.key) });
                }
                if !h.value.is_null() {
                    drop(unsafe { CString::from_raw(h.value) });
                }
            }
        }
    }));
}

/// Free an `FfiUserResult` returned by any `users_parse_*` function or
/// `users_transport_failed`. Safe to call with null. Uses `data_tag` to
/// determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn users_free_result(result: *mut FfiUserResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::User => {
                let user = unsafe { Box::from_raw(result.data as *mut FfiUser) };
                free_ffi_user_fields(&user);
            }
            FfiDataTag::UserList => {
                let list = unsafe { Box::from_raw(result.data as *mut FfiUserList) };
                if !list.items.is_null() && list.len > 0 {
                    let items = unsafe {
                        Box::from_raw(std::ptr::slice_from_raw_parts_mut(list.items, list.len as usize))
                    };
                    for item in items.iter() {
                        free_ffi_user_fields(item);
                    }
                }
            }
            FfiDataTag::Login => {
                let login = unsafe { Box::from_raw(result.data as *mut FfiLogin) };
                for s in [login.token, login.username] {
                    if !s.is_null() {
                        drop(unsafe { CString::from_raw(s) });
                    }
                }
            }
            FfiDataTag::None => {}
        }
    }));
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn users_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
