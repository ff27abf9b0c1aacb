//! Access token capability.
//!
//! An [`AccessToken`] rewrites outgoing requests to carry credentials. How
//! the credential is obtained or refreshed is up to the implementation; the
//! pipeline only asks it to apply itself, once per request.

use std::sync::{Arc, PoisonError, RwLock};

use base64::Engine;

use crate::{Request, RequestOptions, Result};

/// Credential applied to every outgoing request.
///
/// # Example
///
/// ```ignore
/// use tether::{AccessToken, Request, RequestOptions, Result};
///
/// struct AppSecret(String);
///
/// impl AccessToken for AppSecret {
///     fn apply_to_request(&self, mut request: Request, _options: &RequestOptions) -> Result<Request> {
///         request.set_header("X-App-Secret", self.0.clone());
///         Ok(request)
///     }
/// }
/// ```
pub trait AccessToken: Send + Sync + 'static {
    /// Produce the request to send, carrying this credential.
    ///
    /// `options` are the caller's options for this call.
    fn apply_to_request(&self, request: Request, options: &RequestOptions) -> Result<Request>;
}

impl<F> AccessToken for F
where
    F: Fn(Request, &RequestOptions) -> Result<Request> + Send + Sync + 'static,
{
    fn apply_to_request(&self, request: Request, options: &RequestOptions) -> Result<Request> {
        self(request, options)
    }
}

/// `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerToken {
    token: Arc<str>,
}

impl BearerToken {
    /// Create a bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::from(token.into()),
        }
    }
}

impl AccessToken for BearerToken {
    fn apply_to_request(&self, mut request: Request, _options: &RequestOptions) -> Result<Request> {
        request.set_header("Authorization", format!("Bearer {}", self.token));
        Ok(request)
    }
}

/// `Authorization: Basic <base64(user:pass)>`.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    encoded: Arc<str>,
}

impl BasicCredentials {
    /// Create basic credentials.
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        let credentials = format!("{}:{}", username.as_ref(), password.as_ref());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        Self {
            encoded: Arc::from(encoded),
        }
    }
}

impl AccessToken for BasicCredentials {
    fn apply_to_request(&self, mut request: Request, _options: &RequestOptions) -> Result<Request> {
        request.set_header("Authorization", format!("Basic {}", self.encoded));
        Ok(request)
    }
}

/// Token sent as a query parameter, e.g. `?access_token=...`.
#[derive(Debug, Clone)]
pub struct QueryToken {
    name: Arc<str>,
    value: Arc<str>,
}

impl QueryToken {
    /// Token sent as `name=value`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            value: Arc::from(value.into()),
        }
    }

    /// Token sent as `access_token=value`.
    pub fn access_token(value: impl Into<String>) -> Self {
        Self::new("access_token", value)
    }
}

impl AccessToken for QueryToken {
    fn apply_to_request(&self, mut request: Request, _options: &RequestOptions) -> Result<Request> {
        request
            .url_mut()
            .query_pairs_mut()
            .append_pair(&self.name, &self.value);
        Ok(request)
    }
}

/// The client's current token, shared with the `access_token` middleware.
///
/// Replacing the token is visible to requests that start afterwards.
#[derive(Clone, Default)]
pub struct TokenSlot(Arc<RwLock<Option<Arc<dyn AccessToken>>>>);

impl std::fmt::Debug for TokenSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSlot")
            .field("is_set", &self.get().is_some())
            .finish()
    }
}

impl TokenSlot {
    /// Current token.
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn AccessToken>> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the token.
    pub fn set(&self, token: Arc<dyn AccessToken>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Remove the token.
    pub fn clear(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
