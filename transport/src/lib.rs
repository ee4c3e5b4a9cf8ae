//! HTTP transport for the response bridge.
//!
//! [`HttpTransport`] sends raw [`reqwest::Request`]s with a shared, pooled
//! client. Per-run options come from the [`ExecutionConfig`]:
//!
//! | Option | Effect |
//! |--------|--------|
//! | `timeout` | Total request timeout in seconds, applied per request |
//! | `connect_timeout` | Connect timeout in seconds, applied when the client is built |
//! | `headers` | Added to each request unless the request already sets them |
//! | `http_errors` | When true (default), 4xx/5xx responses fail with [`TransportError::Status`] |

mod error;

use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, Request, Response, Url};
use snakepit_core::{Descriptor, Handle, Transport};
use snakepit_types::ExecutionConfig;

pub use error::TransportError;

const CONNECT_TIMEOUT_SECS: u64 = 30;

// reqwest only exposes the keepalive idle time; interval and retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Characters of an error response body kept in [`TransportError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 120;

fn base_client_builder() -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// Work item accepted by [`HttpTransport`].
pub type HttpDescriptor = Descriptor<Request, Response>;

/// Sends requests over a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport whose client honors the config's `connect_timeout`.
    pub fn from_config(config: &ExecutionConfig) -> Result<Self, TransportError> {
        let mut builder = base_client_builder();
        if let Some(connect_timeout) = config.connect_timeout()? {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder.build().map_err(TransportError::Build)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    type Request = Request;
    type Response = Response;

    fn send(&self, mut request: Request, config: &ExecutionConfig) -> Handle<Response> {
        let http_errors = match prepare(&mut request, config) {
            Ok(http_errors) => http_errors,
            Err(e) => return future::ready(Err(e.into())).boxed(),
        };

        let client = self.client.clone();
        async move {
            let method = request.method().clone();
            let url = request.url().clone();
            tracing::trace!(%method, %url, "Sending request");

            let response = client.execute(request).await?;
            let status = response.status();
            tracing::debug!(%method, %url, %status, "Response received");

            if http_errors && (status.is_client_error() || status.is_server_error()) {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status,
                    url,
                    body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                }
                .into());
            }
            Ok(response)
        }
        .boxed()
    }
}

/// Apply per-request options. Returns whether error statuses should fail.
fn prepare(request: &mut Request, config: &ExecutionConfig) -> Result<bool, TransportError> {
    if let Some(timeout) = config.timeout()? {
        request.timeout_mut().get_or_insert(timeout);
    }

    for (name, value) in config.headers()? {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader { name: name.clone() })?;
        let value =
            HeaderValue::from_str(&value).map_err(|_| TransportError::InvalidHeader { name })?;
        request.headers_mut().entry(header).or_insert(value);
    }

    Ok(config.http_errors()?)
}

/// Descriptor for a GET of `url`.
///
/// Anything that does not parse as an absolute `http` or `https` URL becomes
/// [`Descriptor::Unrecognized`], so the run fails on it when it is reached
/// rather than up front.
pub fn get(url: &str) -> HttpDescriptor {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
            Descriptor::request(Request::new(Method::GET, parsed))
        }
        _ => Descriptor::unrecognized(url),
    }
}
