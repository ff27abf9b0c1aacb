//! Core types for the tether API client layer.
//!
//! This crate provides the transport-agnostic building blocks:
//! - [`Method`] - HTTP method enum
//! - [`Request`], [`RequestBuilder`] and [`RequestOptions`] - outgoing requests
//! - [`Body`], [`Multipart`], [`Part`] and [`FileStream`] - request bodies
//! - [`Response`] - HTTP response type
//! - [`Error`] and [`Result`] - Error handling
//! - [`Transport`] - the trait the pipeline sends requests through

mod body;
mod error;
mod method;
mod multipart;
pub mod prelude;
mod request;
mod response;
mod transport;

pub use body::{Body, ContentType, from_json, to_json, to_query_pairs};
pub use error::{Error, Result};
pub use method::Method;
pub use multipart::{FileStream, Multipart, Part, PartContents};
pub use request::{Request, RequestBuilder, RequestOptions, Timeouts};
pub use response::Response;
pub use transport::Transport;
