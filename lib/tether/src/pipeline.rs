//! The request pipeline.
//!
//! [`BaseClient`] is what typed API clients build on: verb helpers assemble
//! [`RequestOptions`], the middleware stack is built on first use, and the
//! transport response is returned raw or unwrapped into the configured
//! [`ResponseType`](crate::ResponseType).

use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::util::BoxCloneService;
use tower_service::Service;
use tracing::debug;
use url::Url;

use crate::config::PipelineConfig;
use crate::eligibility::EligibilityChecker;
use crate::log::LogSink;
use crate::middleware::{
    ACCESS_TOKEN, AccessTokenLayer, BoxedService, ELIGIBILITY, EligibilityLayer, LOG, Layer,
    LogLayer, MiddlewareStack, SyncService, TransportService,
};
use crate::token::{AccessToken, TokenSlot};
use crate::unwrap::{Unwrapped, unwrap_response};
use crate::{
    Body, Error, FileStream, Method, Multipart, Part, Request, RequestOptions, Response, Result,
    Timeouts, Transport, to_query_pairs,
};

/// Timeouts applied to every upload, for connect, send and read alike.
pub const UPLOAD_TIMEOUTS: Timeouts = Timeouts::uniform(Duration::from_secs(30));

const BUILT_IN: [&str; 3] = [ACCESS_TOKEN, LOG, ELIGIBILITY];

/// The built middleware chain.
struct Pipeline {
    names: Vec<String>,
    service: SyncService,
}

/// Base client for typed HTTP API clients.
///
/// The client is `Send + Sync`; share it behind an [`Arc`] to issue calls
/// from several tasks.
///
/// # Example
///
/// ```ignore
/// use tether::{BaseClient, HyperTransport, PipelineConfig, QueryToken, ResponseType};
///
/// let client = BaseClient::builder(HyperTransport::new())
///     .config(
///         PipelineConfig::builder()
///             .response_type(ResponseType::Collection)
///             .base_url("https://api.weixin.qq.com/".parse()?)
///             .build(),
///     )
///     .access_token(QueryToken::access_token("ACCESS_TOKEN"))
///     .build();
///
/// let menu = client.get("cgi-bin/menu/get", &()).await?;
/// ```
pub struct BaseClient {
    transport: SyncService,
    config: PipelineConfig,
    token: TokenSlot,
    logger: Option<Arc<dyn LogSink>>,
    eligibility: Option<Arc<dyn EligibilityChecker>>,
    custom: MiddlewareStack,
    pipeline: OnceLock<Pipeline>,
}

impl std::fmt::Debug for BaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseClient")
            .field("config", &self.config)
            .field("token", &self.token)
            .field("logger", &self.logger.is_some())
            .field("eligibility", &self.eligibility.is_some())
            .field("custom", &self.custom)
            .field("built", &self.pipeline.get().is_some())
            .finish()
    }
}

impl BaseClient {
    /// Client sending through `transport` with `config`, without token,
    /// logger or eligibility checker.
    #[must_use]
    pub fn new(transport: impl Transport, config: PipelineConfig) -> Self {
        Self::builder(transport).config(config).build()
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder(transport: impl Transport) -> BaseClientBuilder {
        BaseClientBuilder::new(transport)
    }

    /// Get the pipeline configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ========================================================================
    // Access token
    // ========================================================================

    /// Replace the access token; requests that start afterwards carry it.
    pub fn set_access_token(&self, token: impl AccessToken) {
        self.token.set(Arc::new(token));
    }

    /// Remove the access token.
    pub fn clear_access_token(&self) {
        self.token.clear();
    }

    /// Current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<Arc<dyn AccessToken>> {
        self.token.get()
    }

    // ========================================================================
    // Middleware stack
    // ========================================================================

    /// Middleware names in request traversal order, building the stack if
    /// needed.
    #[must_use]
    pub fn middleware_names(&self) -> &[String] {
        &self.pipeline().names
    }

    /// Register a custom middleware after the ones already registered.
    ///
    /// Returns `false` if the name is taken, built-in names included. A
    /// successful registration discards the built stack.
    pub fn push_middleware<L>(&mut self, name: impl Into<Cow<'static, str>>, layer: L) -> bool
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        let name = name.into();
        if BUILT_IN.contains(&&*name) || !self.custom.push(name, layer) {
            return false;
        }
        self.reset_middleware();
        true
    }

    /// Discard the built stack; the next request builds it again.
    pub fn reset_middleware(&mut self) {
        self.pipeline.take();
    }

    fn pipeline(&self) -> &Pipeline {
        self.pipeline.get_or_init(|| self.build_pipeline())
    }

    fn build_pipeline(&self) -> Pipeline {
        let mut stack = MiddlewareStack::new();
        stack.push(ACCESS_TOKEN, AccessTokenLayer::new(self.token.clone()));
        if let Some(sink) = &self.logger {
            stack.push(
                LOG,
                LogLayer::new(Arc::clone(sink), self.config.log_template()),
            );
        }
        if let Some(checker) = &self.eligibility {
            stack.push(ELIGIBILITY, EligibilityLayer::new(Arc::clone(checker)));
        }
        stack.extend(&self.custom);

        let names: Vec<String> = stack.names().map(str::to_string).collect();
        debug!(middlewares = ?names, "built middleware stack");

        Pipeline {
            names,
            service: SyncService::new(stack.service(self.transport.boxed())),
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Send a request through the middleware stack.
    ///
    /// With `return_raw` the transport response is returned as
    /// [`Unwrapped::Raw`]; otherwise it is unwrapped into the configured
    /// response type.
    ///
    /// # Errors
    ///
    /// Returns the transport or middleware error unchanged, or
    /// [`Error::Configuration`] if unwrapping is requested and the response
    /// type is unset or unknown.
    pub async fn request(
        &self,
        url: &str,
        method: Method,
        options: RequestOptions,
        return_raw: bool,
    ) -> Result<Unwrapped> {
        let response = self.request_raw(url, method, options).await?;
        if return_raw {
            return Ok(Unwrapped::Raw(response));
        }
        unwrap_response(response, self.config.response_type()?)
    }

    /// Send a request and return the transport response.
    pub async fn request_raw(
        &self,
        url: &str,
        method: Method,
        options: RequestOptions,
    ) -> Result<Response> {
        let url = self.resolve_url(url)?;
        let request = options.to_request(method, url);
        debug!(%method, url = %request.url(), "sending request");
        self.pipeline().service.call(request).await
    }

    /// Send a request and deserialize the JSON body into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        url: &str,
        method: Method,
        options: RequestOptions,
    ) -> Result<T> {
        self.request_raw(url, method, options).await?.json()
    }

    fn resolve_url(&self, url: &str) -> Result<Url> {
        match (Url::parse(url), self.config.base_url()) {
            (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => Ok(base.join(url)?),
            (parsed, _) => Ok(parsed?),
        }
    }

    // ========================================================================
    // Verb helpers
    // ========================================================================

    /// GET with `query` encoded into the URL.
    pub async fn get<Q: Serialize + ?Sized>(&self, url: &str, query: &Q) -> Result<Unwrapped> {
        let options = RequestOptions::new().query_pairs(to_query_pairs(query)?);
        self.request(url, Method::Get, options, false).await
    }

    /// POST with a form-encoded body.
    pub async fn post<F: Serialize + ?Sized>(&self, url: &str, form: &F) -> Result<Unwrapped> {
        let options = RequestOptions::new().body(Body::form(form)?);
        self.request(url, Method::Post, options, false).await
    }

    /// POST with a JSON body.
    pub async fn post_json<J: Serialize + ?Sized>(
        &self,
        url: &str,
        json: &J,
    ) -> Result<Unwrapped> {
        let options = RequestOptions::new().body(Body::json(json)?);
        self.request(url, Method::Post, options, false).await
    }

    /// POST with a JSON body and `query` encoded into the URL.
    pub async fn post_json_with_query<J, Q>(
        &self,
        url: &str,
        json: &J,
        query: &Q,
    ) -> Result<Unwrapped>
    where
        J: Serialize + ?Sized,
        Q: Serialize + ?Sized,
    {
        let options = RequestOptions::new()
            .query_pairs(to_query_pairs(query)?)
            .body(Body::json(json)?);
        self.request(url, Method::Post, options, false).await
    }

    /// PUT with a JSON body.
    pub async fn put<J: Serialize + ?Sized>(&self, url: &str, json: &J) -> Result<Unwrapped> {
        let options = RequestOptions::new().body(Body::json(json)?);
        self.request(url, Method::Put, options, false).await
    }

    /// DELETE with a JSON body.
    pub async fn delete<J: Serialize + ?Sized>(&self, url: &str, json: &J) -> Result<Unwrapped> {
        let options = RequestOptions::new().body(Body::json(json)?);
        self.request(url, Method::Delete, options, false).await
    }

    /// Multipart POST of files and literal fields with [`UPLOAD_TIMEOUTS`].
    ///
    /// File parts come first, then literal fields, each in the given order.
    /// Every file opened here is closed before this returns, whatever the
    /// outcome.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let uploaded = client
    ///     .upload(
    ///         "cgi-bin/media/upload",
    ///         [("media", "/tmp/logo.png")],
    ///         [("type", "image")],
    ///     )
    ///     .await?;
    /// ```
    pub async fn upload<F, K, P, G, N, V>(&self, url: &str, files: F, form: G) -> Result<Unwrapped>
    where
        F: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<Path>,
        G: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut opened = CloseOnDrop::default();
        let mut multipart = Multipart::new();
        for (name, path) in files {
            let stream = FileStream::open(path).await?;
            opened.0.push(stream.clone());
            multipart = multipart.part(Part::file(name, stream));
        }
        for (name, value) in form {
            multipart = multipart.part(Part::text(name, value));
        }

        let options = RequestOptions::new()
            .body(Body::Multipart(multipart))
            .timeouts(UPLOAD_TIMEOUTS);
        self.request(url, Method::Post, options, false).await
    }
}

/// Closes the upload's file streams when the call ends.
#[derive(Default)]
struct CloseOnDrop(Vec<FileStream>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        for stream in &self.0 {
            stream.close();
        }
    }
}

/// Builder for [`BaseClient`].
///
/// Supplying a logger or an eligibility checker installs the matching
/// middleware; custom middlewares follow the built-in ones.
pub struct BaseClientBuilder {
    transport: BoxedService,
    config: PipelineConfig,
    token: Option<Arc<dyn AccessToken>>,
    logger: Option<Arc<dyn LogSink>>,
    eligibility: Option<Arc<dyn EligibilityChecker>>,
    custom: MiddlewareStack,
}

impl std::fmt::Debug for BaseClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseClientBuilder")
            .field("config", &self.config)
            .field("token", &self.token.is_some())
            .field("logger", &self.logger.is_some())
            .field("eligibility", &self.eligibility.is_some())
            .field("custom", &self.custom)
            .finish_non_exhaustive()
    }
}

impl BaseClientBuilder {
    fn new(transport: impl Transport) -> Self {
        Self {
            transport: BoxCloneService::new(TransportService::new(transport)),
            config: PipelineConfig::default(),
            token: None,
            logger: None,
            eligibility: None,
            custom: MiddlewareStack::new(),
        }
    }

    /// Set the pipeline configuration.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the initial access token.
    #[must_use]
    pub fn access_token(mut self, token: impl AccessToken) -> Self {
        self.token = Some(Arc::new(token));
        self
    }

    /// Log every exchange to `sink`.
    #[must_use]
    pub fn logger(mut self, sink: impl LogSink) -> Self {
        self.logger = Some(Arc::new(sink));
        self
    }

    /// Reject responses with `checker`.
    #[must_use]
    pub fn eligibility(mut self, checker: impl EligibilityChecker) -> Self {
        self.eligibility = Some(Arc::new(checker));
        self
    }

    /// Register a custom middleware.
    ///
    /// Names already taken, built-in names included, are ignored.
    #[must_use]
    pub fn middleware<L>(mut self, name: impl Into<Cow<'static, str>>, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        let name = name.into();
        if !BUILT_IN.contains(&&*name) {
            self.custom.push(name, layer);
        }
        self
    }

    /// Build the client. The middleware stack is built on first use.
    #[must_use]
    pub fn build(self) -> BaseClient {
        let token = TokenSlot::default();
        if let Some(initial) = self.token {
            token.set(initial);
        }
        BaseClient {
            transport: SyncService::new(self.transport),
            config: self.config,
            token,
            logger: self.logger,
            eligibility: self.eligibility,
            custom: self.custom,
            pipeline: OnceLock::new(),
        }
    }
}
