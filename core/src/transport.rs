//! Executes `HttpRequest` values against the network.
//!
//! # Design
//! `Transport` is the single I/O seam of the crate. Implementations never
//! interpret status codes; a 4xx or 5xx is still an `Ok(HttpResponse)`. They
//! only report a `TransportError` when no response arrived at all, classified
//! so the client can tell "offline" apart from other network failures.

use async_trait::async_trait;

use crate::http::{HttpRequest, HttpResponse, TransportError};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use std::error::Error as StdError;
    use std::io;
    use std::time::Duration;

    use async_trait::async_trait;
    use tracing::debug;

    use super::Transport;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse, TransportError, TransportErrorKind};

    /// `Transport` backed by a shared `reqwest::Client`.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(timeout: Duration) -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;
            Ok(Self { client })
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
                HttpMethod::Delete => reqwest::Method::DELETE,
            };

            let mut builder = self.client.request(method, request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(classify)?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
                .collect();
            let body = response.text().await.map_err(classify)?;
            debug!(status, url = %request.url, "received response");

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }

    /// Sort a reqwest failure into the connectivity buckets.
    ///
    /// A refused connection means the network is up but nothing answered,
    /// so it is not "offline".
    fn classify(err: reqwest::Error) -> TransportError {
        let kind = match io_error_kind(&err) {
            Some(io::ErrorKind::ConnectionRefused) => TransportErrorKind::Other,
            Some(
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof,
            ) => TransportErrorKind::ConnectionLost,
            _ if err.is_connect() => TransportErrorKind::NotConnected,
            _ => TransportErrorKind::Other,
        };
        TransportError::new(kind, err.to_string())
    }

    /// Kind of the first `io::Error` in the source chain.
    fn io_error_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                return Some(io_err.kind());
            }
            source = cause.source();
        }
        None
    }
}
