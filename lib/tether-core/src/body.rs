//! Request body variants and serialization utilities.

use bytes::Bytes;

use crate::{Multipart, Result};

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
    /// Plain text content type (`text/plain`).
    PlainText,
    /// Binary content type (`application/octet-stream`).
    OctetStream,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::PlainText => "text/plain",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an outgoing request.
///
/// Bodies stay structured until the transport encodes them, so middlewares
/// and tests can inspect what is about to be sent.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Form URL-encoded fields, in order.
    Form(Vec<(String, String)>),
    /// JSON payload.
    Json(serde_json::Value),
    /// Multipart parts (file streams and literal fields).
    Multipart(Multipart),
}

impl Body {
    /// Build a form body from any serializable value.
    ///
    /// # Example
    ///
    /// ```
    /// use tether_core::Body;
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Login { username: String, password: String }
    ///
    /// let login = Login { username: "alice".to_string(), password: "secret".to_string() };
    /// let body = Body::form(&login).expect("serialize");
    /// assert_eq!(
    ///     body.as_form(),
    ///     Some(&[
    ///         ("username".to_string(), "alice".to_string()),
    ///         ("password".to_string(), "secret".to_string()),
    ///     ][..])
    /// );
    /// ```
    pub fn form<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self> {
        let encoded = serde_html_form::to_string(value)?;
        let pairs = url::form_urlencoded::parse(encoded.as_bytes())
            .into_owned()
            .collect();
        Ok(Self::Form(pairs))
    }

    /// Build a JSON body from any serializable value.
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Returns `true` for [`Body::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Form fields, if this is a form body.
    #[must_use]
    pub fn as_form(&self) -> Option<&[(String, String)]> {
        match self {
            Self::Form(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// JSON payload, if this is a JSON body.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Multipart parts, if this is a multipart body.
    #[must_use]
    pub const fn as_multipart(&self) -> Option<&Multipart> {
        match self {
            Self::Multipart(multipart) => Some(multipart),
            _ => None,
        }
    }

    /// Encode the body for the wire.
    ///
    /// Returns the `Content-Type` header value (if any) and the encoded bytes.
    /// Multipart bodies read their file streams here.
    pub async fn encode(&self) -> Result<(Option<String>, Bytes)> {
        match self {
            Self::Empty => Ok((None, Bytes::new())),
            Self::Form(pairs) => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (name, value) in pairs {
                    serializer.append_pair(name, value);
                }
                let encoded = serializer.finish();
                Ok((
                    Some(ContentType::FormUrlEncoded.to_string()),
                    Bytes::from(encoded),
                ))
            }
            Self::Json(value) => Ok((Some(ContentType::Json.to_string()), to_json(value)?)),
            Self::Multipart(multipart) => {
                let (content_type, bytes) = multipart.encode().await?;
                Ok((Some(content_type), bytes))
            }
        }
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to query parameter pairs.
///
/// Uses `serde_html_form`, so `Vec<T>` fields become repeated parameters.
///
/// # Example
///
/// ```
/// use tether_core::to_query_pairs;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Search {
///     q: String,
///     #[serde(skip_serializing_if = "Option::is_none")]
///     page: Option<u32>,
/// }
///
/// let pairs = to_query_pairs(&Search { q: "rust".to_string(), page: None }).expect("serialize");
/// assert_eq!(pairs, vec![("q".to_string(), "rust".to_string())]);
/// ```
pub fn to_query_pairs<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<(String, String)>> {
    let encoded = serde_html_form::to_string(value)?;
    Ok(url::form_urlencoded::parse(encoded.as_bytes())
        .into_owned()
        .collect())
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error` so the error names the exact field that failed.
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}
