//! Prelude module for convenient imports.
//!
//! ```ignore
//! use tether_core::prelude::*;
//! ```

pub use crate::{
    Body, Error, FileStream, Method, Multipart, Part, Request, RequestOptions, Response, Result,
    Timeouts, Transport,
};
