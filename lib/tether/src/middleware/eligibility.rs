//! Response eligibility middleware.
//!
//! Runs the client's [`EligibilityChecker`] on every response that made it
//! back from the transport and turns rejections into [`Error::Ineligible`].

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use tracing::debug;

use super::ServiceFuture;
use crate::{EligibilityChecker, Error, Request, Response, Result};

/// Layer that checks responses with an [`EligibilityChecker`].
#[derive(Clone)]
pub struct EligibilityLayer {
    checker: Arc<dyn EligibilityChecker>,
}

impl std::fmt::Debug for EligibilityLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EligibilityLayer").finish_non_exhaustive()
    }
}

impl EligibilityLayer {
    /// Create a layer using `checker`.
    #[must_use]
    pub fn new(checker: Arc<dyn EligibilityChecker>) -> Self {
        Self { checker }
    }
}

impl<S> Layer<S> for EligibilityLayer {
    type Service = EligibilityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EligibilityService {
            inner,
            checker: Arc::clone(&self.checker),
        }
    }
}

/// Service that rejects ineligible responses.
#[derive(Clone)]
pub struct EligibilityService<S> {
    inner: S,
    checker: Arc<dyn EligibilityChecker>,
}

impl<S> Service<Request> for EligibilityService<S>
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
        let checker = Arc::clone(&self.checker);
        let sent = request.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(request).await?;
            match checker
                .is_not_eligible_response(&response, &sent)
                .rejection_message()
            {
                Some(message) => {
                    debug!(status = response.status(), %message, "response rejected");
                    Err(Error::ineligible(message, sent, response))
                }
                None => Ok(response),
            }
        })
    }
}
