//! Error types for tether.
//!
//! Three families surface to callers:
//! - configuration errors, raised when an unwrap is requested without a usable response type,
//! - eligibility errors, raised when the client rejects an otherwise successful response,
//! - transport errors, propagated unchanged from the [`Transport`](crate::Transport).

use derive_more::{Display, Error, From};

use crate::{Request, Response};

/// Main error type for tether operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The pipeline configuration cannot satisfy the call (e.g. missing response type).
    #[display("configuration error: {_0}")]
    #[from(skip)]
    Configuration(#[error(not(source))] String),

    /// The response was rejected by the client's eligibility check.
    #[display("{message}")]
    #[from(skip)]
    Ineligible {
        /// Rejection message.
        message: String,
        /// The request that produced the rejected response.
        #[error(not(source))]
        request: Box<Request>,
        /// The rejected response.
        #[error(not(source))]
        response: Box<Response>,
    },

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The request could not be assembled or sent as-is.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// I/O error, e.g. while opening a file for upload.
    #[display("I/O error: {_0}")]
    #[from]
    Io(std::io::Error),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_html_form::ser::Error),

    /// Response body is not valid UTF-8.
    #[display("invalid UTF-8 in response body: {_0}")]
    #[from]
    Utf8(std::string::FromUtf8Error),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an eligibility error carrying the rejected exchange.
    #[must_use]
    pub fn ineligible(message: impl Into<String>, request: Request, response: Response) -> Self {
        Self::Ineligible {
            message: message.into(),
            request: Box::new(request),
            response: Box::new(response),
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns `true` if the eligibility check rejected the response.
    #[must_use]
    pub const fn is_ineligible(&self) -> bool {
        matches!(self, Self::Ineligible { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` for failures that originate in the transport.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Tls(_) | Self::Timeout | Self::InvalidRequest(_)
        )
    }

    /// The request attached to an eligibility error.
    #[must_use]
    pub fn ineligible_request(&self) -> Option<&Request> {
        match self {
            Self::Ineligible { request, .. } => Some(request),
            _ => None,
        }
    }

    /// The response attached to an eligibility error.
    #[must_use]
    pub fn ineligible_response(&self) -> Option<&Response> {
        match self {
            Self::Ineligible { response, .. } => Some(response),
            _ => None,
        }
    }
}
