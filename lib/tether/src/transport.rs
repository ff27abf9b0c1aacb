//! Default transport using hyper-util.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tracing::trace;

use crate::{
    Error, Request, Response, Result, Timeouts, Transport, config::HyperTransportConfig,
    connector::https_connector,
};

/// HTTP transport using hyper-util with connection pooling and TLS.
///
/// Requests carrying [`Timeouts`] get `connect + send` to encode the body and
/// receive response headers, and `read` to receive the body. Connecting
/// itself is bounded by [`HyperTransportConfig::connect_timeout`], which
/// also caps the `connect` share. Other requests are bounded by
/// [`HyperTransportConfig::timeout`] as a whole.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use tether::{HyperTransport, HyperTransportConfig};
///
/// let transport = HyperTransport::with_config(
///     HyperTransportConfig::builder()
///         .timeout(Duration::from_secs(10))
///         .build(),
/// );
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: HyperTransportConfig,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a transport with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HyperTransportConfig::default())
    }

    /// Create a transport with custom configuration.
    #[must_use]
    pub fn with_config(config: HyperTransportConfig) -> Self {
        let connector = https_connector(config.connect_timeout);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Self { inner, config }
    }

    /// Get the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &HyperTransportConfig {
        &self.config
    }

    /// Build a hyper request, encoding the body.
    async fn build_hyper_request(request: Request) -> Result<http::Request<Full<Bytes>>> {
        let (content_type, body) = request.body().encode().await?;
        let (method, url, headers, _) = request.into_parts();

        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());

        let has_content_type = headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"));
        if let Some(content_type) = content_type.filter(|_| !has_content_type) {
            builder = builder.header(http::header::CONTENT_TYPE, content_type);
        }

        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(Full::new(body))
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    /// Extract response headers as a `HashMap`.
    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        match request.timeouts() {
            Some(timeouts) => {
                let head = self.head_timeout(&timeouts);
                self.exchange(request, head, Some(timeouts.read)).await
            }
            None => {
                let total = self.config.timeout;
                tokio::time::timeout(total, self.exchange(request, total, None))
                    .await
                    .map_err(|_| Error::Timeout)?
            }
        }
    }

    /// Time allowed from encoding the body to receiving response headers.
    ///
    /// The connector bounds connecting by
    /// [`HyperTransportConfig::connect_timeout`], so a longer per-call
    /// connect timeout cannot extend the wait.
    fn head_timeout(&self, timeouts: &Timeouts) -> Duration {
        timeouts.connect.min(self.config.connect_timeout) + timeouts.send
    }

    async fn exchange(
        &self,
        request: Request,
        head_timeout: Duration,
        body_timeout: Option<Duration>,
    ) -> Result<Response> {
        let head = async {
            let hyper_request = Self::build_hyper_request(request).await?;
            trace!(uri = %hyper_request.uri(), "sending request");
            self.inner
                .request(hyper_request)
                .await
                .map_err(Self::map_hyper_error)
        };
        let response = tokio::time::timeout(head_timeout, head)
            .await
            .map_err(|_| Error::Timeout)??;

        let status = response.status().as_u16();
        let response_headers = Self::extract_headers(response.headers());

        let collect = response.into_body().collect();
        let collected = match body_timeout {
            Some(read) => tokio::time::timeout(read, collect)
                .await
                .map_err(|_| Error::Timeout)?,
            None => collect.await,
        };
        let body = collected
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Response::new(status, response_headers, body))
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();

        if err.is_connect() {
            return Error::connection(msg);
        }

        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HyperTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        self.execute(request).await
    }
}
