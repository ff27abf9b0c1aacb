//! Base request layer for typed HTTP API clients.
//!
//! A [`BaseClient`] wraps a [`Transport`] with a named middleware stack
//! (credential injection, logging, response eligibility) and unwraps
//! responses into the shape selected by [`ResponseType`].
//!
//! # Example
//!
//! ```ignore
//! use tether::prelude::*;
//!
//! let client = BaseClient::builder(HyperTransport::new())
//!     .config(
//!         PipelineConfig::builder()
//!             .response_type(ResponseType::Object)
//!             .base_url("https://api.example.com/".parse()?)
//!             .build(),
//!     )
//!     .access_token(BearerToken::new("secret"))
//!     .logger(TracingSink)
//!     .eligibility(SuccessStatus)
//!     .build();
//!
//! let user = client.get("users/42", &[("lang", "en")]).await?;
//! ```

mod config;
mod connector;
mod eligibility;
mod log;
pub mod middleware;
mod pipeline;
pub mod prelude;
mod token;
mod transport;
mod unwrap;

pub use config::{
    BASE_URI_KEY, ConfigSource, EnvConfig, HyperTransportConfig, HyperTransportConfigBuilder,
    LOG_TEMPLATE_KEY, PipelineConfig, PipelineConfigBuilder, RESPONSE_TYPE_KEY,
};
pub use eligibility::{DEFAULT_INELIGIBLE_MESSAGE, Eligibility, EligibilityChecker, SuccessStatus};
pub use log::{DEFAULT_LOG_TEMPLATE, LogEntry, LogSink, LogTemplate, TracingSink};
pub use pipeline::{BaseClient, BaseClientBuilder, UPLOAD_TIMEOUTS};
pub use token::{AccessToken, BasicCredentials, BearerToken, QueryToken, TokenSlot};
pub use transport::HyperTransport;
pub use unwrap::{ResponseType, Unwrapped, unwrap_response};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use tether_core::{
    Body, ContentType, Error, FileStream, Method, Multipart, Part, PartContents, Request,
    RequestBuilder, RequestOptions, Response, Result, Timeouts, Transport, from_json, to_json,
    to_query_pairs,
};

pub use url;
