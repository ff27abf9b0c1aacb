//! Prelude module for convenient imports.
//!
//! ```ignore
//! use tether::prelude::*;
//! ```

pub use crate::{
    AccessToken, BaseClient, BearerToken, Body, Eligibility, EligibilityChecker, Error,
    HyperTransport, LogSink, Method, PipelineConfig, QueryToken, Request, RequestOptions, Response,
    ResponseType, Result, SuccessStatus, TracingSink, Transport, Unwrapped,
};
pub use serde::{Deserialize, Serialize};
