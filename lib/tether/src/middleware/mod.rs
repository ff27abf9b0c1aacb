//! Middleware stack for the request pipeline.
//!
//! A [`MiddlewareStack`] is an ordered list of uniquely named Tower layers.
//! The first registered layer is the outermost one: requests traverse the
//! stack in registration order on the way to the transport, and responses
//! traverse it in reverse on the way back.
//!
//! # Built-in Layers
//!
//! [`BaseClient`](crate::BaseClient) registers, in order:
//!
//! | Name | Layer | Installed |
//! |------|-------|-----------|
//! | `access_token` | [`AccessTokenLayer`] | always |
//! | `log` | [`LogLayer`] | when a log sink is configured |
//! | `eligibility` | [`EligibilityLayer`] | when an eligibility checker is configured |
//!
//! Custom layers registered on the client builder follow these.
//!
//! # Example
//!
//! ```ignore
//! use tether::middleware::MiddlewareStack;
//!
//! let mut stack = MiddlewareStack::new();
//! assert!(stack.push("audit", AuditLayer::new()));
//! assert!(!stack.push("audit", AuditLayer::new())); // already registered
//! let service = stack.service(transport_service);
//! ```

mod access_token;
mod eligibility;
mod logging;

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tower::ServiceExt;
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::{Error, Request, Response, Result, Transport};

pub use access_token::{AccessTokenLayer, AccessTokenService};
pub use eligibility::{EligibilityLayer, EligibilityService};
pub use logging::{LogLayer, Logging};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};

/// Name of the credential injection middleware.
pub const ACCESS_TOKEN: &str = "access_token";
/// Name of the request/response log middleware.
pub const LOG: &str = "log";
/// Name of the response eligibility middleware.
pub const ELIGIBILITY: &str = "eligibility";

/// Type-erased service every middleware wraps.
pub type BoxedService = BoxCloneService<Request, Response, Error>;

/// Future type returned by pipeline services.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

type LayerFn = Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>;

/// Ordered, uniquely named chain of middlewares.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    entries: Vec<(Cow<'static, str>, LayerFn)>,
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl MiddlewareStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer under `name`, innermost so far.
    ///
    /// Returns `false` and leaves the stack untouched if `name` is already
    /// registered.
    pub fn push<L>(&mut self, name: impl Into<Cow<'static, str>>, layer: L) -> bool
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.push_boxed(
            name,
            Arc::new(move |service| BoxCloneService::new(layer.layer(service))),
        )
    }

    fn push_boxed(&mut self, name: impl Into<Cow<'static, str>>, layer: LayerFn) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, layer));
        true
    }

    /// Append every entry of `other` whose name is not registered yet.
    pub fn extend(&mut self, other: &Self) {
        for (name, layer) in &other.entries {
            self.push_boxed(name.clone(), Arc::clone(layer));
        }
    }

    /// Returns `true` if a middleware named `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == name)
    }

    /// Names in registration (request traversal) order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| &**name)
    }

    /// Number of registered middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wrap `inner` so the first registered layer is outermost.
    #[must_use]
    pub fn service(&self, inner: BoxedService) -> BoxedService {
        self.entries
            .iter()
            .rev()
            .fold(inner, |service, (_, layer)| layer(service))
    }
}

// ============================================================================
// Transport adapter
// ============================================================================

/// Tower service sending requests through a [`Transport`].
pub struct TransportService<T> {
    transport: Arc<T>,
}

impl<T> Clone for TransportService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> TransportService<T> {
    /// Wrap a transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }
}

impl<T: Transport> Service<Request> for TransportService<T> {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let transport = Arc::clone(&self.transport);
        Box::pin(async move { transport.send(request).await })
    }
}

// ============================================================================
// Shareable service
// ============================================================================

/// Thread-safe wrapper for [`BoxedService`].
///
/// `BoxCloneService` is `Send` but not `Sync`; the mutex is held only long
/// enough to clone the service for a call.
#[derive(Clone)]
pub(crate) struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    pub(crate) fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    pub(crate) fn boxed(&self) -> BoxedService {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn call(&self, request: Request) -> ServiceFuture {
        let service = self.boxed();
        Box::pin(async move { service.oneshot(request).await })
    }
}
