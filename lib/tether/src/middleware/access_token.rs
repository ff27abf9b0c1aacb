//! Credential injection middleware.
//!
//! Reads the client's current [`AccessToken`](crate::AccessToken) at call
//! time and lets it rewrite the outgoing request. Without a token the request
//! passes through untouched.

use std::task::{Context, Poll};

use tower::{Layer, Service};

use super::ServiceFuture;
use crate::token::TokenSlot;
use crate::{Error, Request, RequestOptions, Response, Result};

/// Layer that applies the client's access token to requests.
#[derive(Debug, Clone)]
pub struct AccessTokenLayer {
    slot: TokenSlot,
}

impl AccessTokenLayer {
    /// Create a layer reading tokens from `slot`.
    #[must_use]
    pub fn new(slot: TokenSlot) -> Self {
        Self { slot }
    }
}

impl<S> Layer<S> for AccessTokenLayer {
    type Service = AccessTokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessTokenService {
            inner,
            slot: self.slot.clone(),
        }
    }
}

/// Service that applies the client's access token to requests.
#[derive(Debug, Clone)]
pub struct AccessTokenService<S> {
    inner: S,
    slot: TokenSlot,
}

impl<S> Service<Request> for AccessTokenService<S>
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
        let token = self.slot.get();
        // call the instance that was polled ready
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let request = match token {
                Some(token) => {
                    let options = request
                        .extensions()
                        .get::<RequestOptions>()
                        .cloned()
                        .unwrap_or_default();
                    token.apply_to_request(request, &options)?
                }
                None => request,
            };
            inner.call(request).await
        })
    }
}
