//! Response unwrapping.
//!
//! Converts a raw [`Response`] into the shape selected by the configured
//! [`ResponseType`].

use std::collections::BTreeMap;
use std::str::FromStr;

use derive_more::Display;
use indexmap::IndexMap;
use serde_json::Value;

use crate::{Error, Response, Result, from_json};

/// Output shape for unwrapped responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ResponseType {
    /// The transport response, unchanged.
    #[display("raw")]
    Raw,
    /// A keyed mapping parsed from a JSON object.
    #[display("array")]
    Array,
    /// Any JSON value.
    #[display("object")]
    Object,
    /// A JSON object keeping the body's key order.
    #[display("collection")]
    Collection,
    /// The body as text.
    #[display("string")]
    String,
}

impl FromStr for ResponseType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "raw" => Ok(Self::Raw),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            "collection" => Ok(Self::Collection),
            "string" => Ok(Self::String),
            other => Err(Error::configuration(format!(
                "response_type \"{other}\" is not supported"
            ))),
        }
    }
}

impl ResponseType {
    /// Resolve a configured setting; unset or unknown values are errors.
    pub fn from_setting(setting: Option<&str>) -> Result<Self> {
        setting
            .ok_or_else(|| Error::configuration("response_type is not set"))?
            .parse()
    }
}

/// A response in the caller-configured shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Unwrapped {
    /// The transport response, unchanged.
    Raw(Response),
    /// Keyed mapping.
    Mapping(BTreeMap<String, Value>),
    /// Arbitrary JSON value.
    Object(Value),
    /// Ordered key-value collection (top-level key order of the body).
    Collection(IndexMap<String, Value>),
    /// Body text.
    Text(String),
}

impl Unwrapped {
    /// The raw response, if unwrapping was skipped.
    #[must_use]
    pub fn into_raw(self) -> Option<Response> {
        match self {
            Self::Raw(response) => Some(response),
            _ => None,
        }
    }

    /// The mapping, for [`ResponseType::Array`].
    #[must_use]
    pub const fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    /// The JSON value, for [`ResponseType::Object`].
    #[must_use]
    pub const fn as_object(&self) -> Option<&Value> {
        match self {
            Self::Object(value) => Some(value),
            _ => None,
        }
    }

    /// The ordered collection, for [`ResponseType::Collection`].
    #[must_use]
    pub const fn as_collection(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// The text, for [`ResponseType::String`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Shape `response` as `response_type`.
///
/// An empty (or whitespace-only) body yields an empty mapping, `null`, or an
/// empty collection.
pub fn unwrap_response(response: Response, response_type: ResponseType) -> Result<Unwrapped> {
    let blank = response.body().iter().all(u8::is_ascii_whitespace);
    match response_type {
        ResponseType::Raw => Ok(Unwrapped::Raw(response)),
        ResponseType::Array if blank => Ok(Unwrapped::Mapping(BTreeMap::new())),
        ResponseType::Array => from_json(response.body()).map(Unwrapped::Mapping),
        ResponseType::Object if blank => Ok(Unwrapped::Object(Value::Null)),
        ResponseType::Object => from_json(response.body()).map(Unwrapped::Object),
        ResponseType::Collection if blank => Ok(Unwrapped::Collection(IndexMap::new())),
        ResponseType::Collection => from_json(response.body()).map(Unwrapped::Collection),
        ResponseType::String => response.text().map(Unwrapped::Text),
    }
}
