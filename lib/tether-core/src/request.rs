//! HTTP request building.
//!
//! Use [`Request::builder`] to construct requests with headers, query
//! parameters and a [`Body`]. Callers of the pipeline usually describe a
//! request with [`RequestOptions`] instead and let the verb helpers assemble it.
//!
//! # Example
//!
//! ```
//! use tether_core::{Method, Request};
//!
//! let request = Request::builder(Method::Get, "https://api.example.com".parse().unwrap())
//!     .header("Accept", "application/json")
//!     .query("page", "1")
//!     .build();
//! assert_eq!(request.url().query(), Some("page=1"));
//! ```

use std::collections::HashMap;
use std::time::Duration;

use crate::{Body, Method};

/// Per-call timeouts, honoured by the transport when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time allowed to establish the connection.
    pub connect: Duration,
    /// Time allowed to send the request.
    pub send: Duration,
    /// Time allowed to read the response.
    pub read: Duration,
}

impl Timeouts {
    /// Same duration for every phase.
    #[must_use]
    pub const fn uniform(duration: Duration) -> Self {
        Self {
            connect: duration,
            send: duration,
            read: duration,
        }
    }
}

/// An HTTP request with method, URL, headers and body.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: url::Url,
    headers: HashMap<String, String>,
    body: Body,
    timeouts: Option<Timeouts>,
    extensions: http::Extensions,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: url::Url) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL, query included.
    #[must_use]
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Mutable access to the URL.
    #[must_use]
    pub fn url_mut(&mut self) -> &mut url::Url {
        &mut self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Mutable access to headers.
    #[must_use]
    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    /// Single header value by name, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any existing one whose name differs only in
    /// ASCII case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Per-call timeouts, if any.
    #[must_use]
    pub const fn timeouts(&self) -> Option<Timeouts> {
        self.timeouts
    }

    /// Per-call data attached by the pipeline or middlewares.
    #[must_use]
    pub const fn extensions(&self) -> &http::Extensions {
        &self.extensions
    }

    /// Mutable access to the extensions.
    #[must_use]
    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        &mut self.extensions
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, url::Url, HashMap<String, String>, Body) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: url::Url) -> Self {
        Self {
            request: Request {
                method,
                url,
                headers: HashMap::new(),
                body: Body::Empty,
                timeouts: None,
                extensions: http::Extensions::new(),
            },
        }
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.set_header(name, value);
        self
    }

    /// Sets multiple headers.
    #[must_use]
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        for (name, value) in headers {
            self.request.set_header(name, value);
        }
        self
    }

    /// Appends a query parameter to the URL.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.request.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Appends multiple query parameters to the URL.
    #[must_use]
    pub fn query_pairs<'a>(mut self, pairs: impl IntoIterator<Item = &'a (String, String)>) -> Self {
        let mut pairs = pairs.into_iter().peekable();
        if pairs.peek().is_some() {
            let mut query = self.request.url.query_pairs_mut();
            for (name, value) in pairs {
                query.append_pair(name, value);
            }
        }
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: Body) -> Self {
        self.request.body = body;
        self
    }

    /// Sets per-call timeouts.
    #[must_use]
    pub fn timeouts(mut self, timeouts: Option<Timeouts>) -> Self {
        self.request.timeouts = timeouts;
        self
    }

    /// Attaches a typed extension.
    #[must_use]
    pub fn extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.request.extensions.insert(value);
        self
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request {
        self.request
    }
}

/// Caller-side description of a request, filled in by the verb helpers.
///
/// The pipeline attaches a copy to the outgoing request's extensions so
/// credential providers can see what the caller asked for.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Body,
    timeouts: Option<Timeouts>,
}

impl RequestOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add query parameters.
    #[must_use]
    pub fn query_pairs(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Set per-call timeouts.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Query parameters in order.
    #[must_use]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    /// Extra headers in order.
    #[must_use]
    pub fn header_pairs(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Body variant.
    #[must_use]
    pub const fn body_ref(&self) -> &Body {
        &self.body
    }

    /// Per-call timeouts.
    #[must_use]
    pub const fn timeout_policy(&self) -> Option<Timeouts> {
        self.timeouts
    }

    /// Assemble the request these options describe.
    ///
    /// A copy of the options is stored in the request extensions.
    #[must_use]
    pub fn to_request(&self, method: Method, url: url::Url) -> Request {
        Request::builder(method, url)
            .query_pairs(&self.query)
            .headers(self.headers.iter().cloned())
            .body(self.body.clone())
            .timeouts(self.timeouts)
            .extension(self.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn url(path: &str) -> url::Url {
        url::Url::parse(&format!("https://api.example.com{path}")).expect("valid URL")
    }

    #[test]
    fn request_builder_basic() {
        let request = Request::builder(Method::Get, url("/users"))
            .header("Accept", "application/json")
            .build();

        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.url().as_str(), "https://api.example.com/users");
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert!(request.body().is_empty());
        assert!(request.timeouts().is_none());
    }

    #[test]
    fn headers_ignore_ascii_case() {
        let mut request = Request::builder(Method::Get, url("/users"))
            .header("authorization", "Bearer caller")
            .build();
        assert_eq!(request.header("Authorization"), Some("Bearer caller"));

        request.set_header("Authorization", "Bearer token");
        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer token"));
    }

    #[test]
    fn request_builder_with_query() {
        let request = Request::builder(Method::Get, url("/users"))
            .query("page", "1")
            .query("limit", "10")
            .build();

        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/users?page=1&limit=10"
        );
    }

    #[test]
    fn empty_query_pairs_leave_url_untouched() {
        let request = Request::builder(Method::Get, url("/users"))
            .query_pairs(&Vec::new())
            .build();

        assert_eq!(request.url().as_str(), "https://api.example.com/users");
    }

    #[test]
    fn options_to_request() {
        let options = RequestOptions::new()
            .query("lang", "en")
            .header("X-Trace", "abc")
            .body(Body::Json(json!({"name": "x"})))
            .timeouts(Timeouts::uniform(Duration::from_secs(5)));

        let request = options.to_request(Method::Post, url("/menu"));

        assert_eq!(request.url().query(), Some("lang=en"));
        assert_eq!(request.header("X-Trace"), Some("abc"));
        assert_eq!(request.body().as_json(), Some(&json!({"name": "x"})));
        assert_eq!(
            request.timeouts(),
            Some(Timeouts::uniform(Duration::from_secs(5)))
        );

        let attached = request
            .extensions()
            .get::<RequestOptions>()
            .expect("options attached");
        assert_eq!(attached.query_params(), options.query_params());
    }
}
