//! Transport trait.
//!
//! A [`Transport`] is the innermost handler of the pipeline: it puts a
//! [`Request`] on the wire and returns the [`Response`]. The `tether` crate
//! bundles a hyper-based implementation; implement the trait directly for
//! custom stacks or for testing.

use std::future::Future;
use std::sync::Arc;

use crate::{Request, Response, Result};

/// Sends requests.
///
/// Implementations should honour [`Request::timeouts`] when present and map
/// their own failures onto the transport variants of [`Error`](crate::Error).
///
/// # Example
///
/// ```ignore
/// use tether_core::{Request, Response, Result, Transport};
///
/// struct Canned;
///
/// impl Transport for Canned {
///     async fn send(&self, _request: Request) -> Result<Response> {
///         Ok(Response::new(200, Default::default(), r#"{"ok":true}"#))
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Send a request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason:
    /// - Network errors
    /// - TLS errors
    /// - Timeouts
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        T::send(self, request)
    }
}
