//! Request/response log middleware.
//!
//! Formats every exchange with a [`LogTemplate`] and hands the line to a
//! [`LogSink`]. The outcome of the call is returned untouched.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{Instrument, Level, span};

use super::ServiceFuture;
use crate::log::{LogEntry, LogSink, LogTemplate};
use crate::{Error, Request, Response, Result};

/// Layer that records request/response pairs.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tether::{LogTemplate, TracingSink};
/// use tether::middleware::LogLayer;
///
/// let layer = LogLayer::new(Arc::new(TracingSink), LogTemplate::default());
/// ```
#[derive(Clone)]
pub struct LogLayer {
    sink: Arc<dyn LogSink>,
    template: Arc<LogTemplate>,
}

impl std::fmt::Debug for LogLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLayer")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl LogLayer {
    /// Create a log layer writing to `sink` with `template`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>, template: LogTemplate) -> Self {
        Self {
            sink,
            template: Arc::new(template),
        }
    }
}

impl<S> Layer<S> for LogLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            sink: Arc::clone(&self.sink),
            template: Arc::clone(&self.template),
        }
    }
}

/// Service that records requests and responses.
#[derive(Clone)]
pub struct Logging<S> {
    inner: S,
    sink: Arc<dyn LogSink>,
    template: Arc<LogTemplate>,
}

impl<S> Service<Request> for Logging<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let method = request.method();
        let url = request.url().to_string();
        let span = span!(Level::DEBUG, "http_request", %method, %url);

        let sent = request.clone();
        let sink = Arc::clone(&self.sink);
        let template = Arc::clone(&self.template);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = inner.call(request).await;

                let entry = LogEntry::new(&sent, result.as_ref(), start.elapsed());
                sink.log(&template.format(&entry));

                result
            }
            .instrument(span),
        )
    }
}
