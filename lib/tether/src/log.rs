//! Log sinks and the request/response log template.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

use crate::{Error, Request, Response};

/// Template used when none is configured.
pub const DEFAULT_LOG_TEMPLATE: &str = "{method} {url} {code} {elapsed_ms}ms";

/// Destination for formatted request/response lines.
///
/// Configuring a sink installs the `log` middleware; without one the
/// middleware is not part of the stack at all.
pub trait LogSink: Send + Sync + 'static {
    /// Record one formatted line.
    fn log(&self, entry: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn log(&self, entry: &str) {
        self(entry);
    }
}

/// Sink forwarding lines to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, entry: &str) {
        tracing::info!(target: "tether::http", "{entry}");
    }
}

/// One exchange as seen by the log middleware.
#[derive(Debug)]
pub struct LogEntry<'a> {
    request: &'a Request,
    outcome: Result<&'a Response, &'a Error>,
    elapsed: Duration,
}

impl<'a> LogEntry<'a> {
    /// Describe an exchange.
    #[must_use]
    pub const fn new(
        request: &'a Request,
        outcome: Result<&'a Response, &'a Error>,
        elapsed: Duration,
    ) -> Self {
        Self {
            request,
            outcome,
            elapsed,
        }
    }

    /// Response of the exchange, including one rejected as ineligible.
    #[must_use]
    pub fn response(&self) -> Option<&'a Response> {
        match self.outcome {
            Ok(response) => Some(response),
            Err(err) => err.ineligible_response(),
        }
    }
}

/// Line template with `{placeholder}` substitution.
///
/// Supported placeholders: `{method}`, `{url}`, `{host}`, `{path}`, `{code}`,
/// `{req_headers}`, `{res_headers}`, `{res_body}`, `{error}`, `{elapsed_ms}`.
/// Unknown placeholders are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTemplate(String);

impl Default for LogTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_TEMPLATE)
    }
}

impl LogTemplate {
    /// Create a template.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the template for `entry`.
    #[must_use]
    pub fn format(&self, entry: &LogEntry<'_>) -> String {
        let mut out = String::with_capacity(self.0.len() + 32);
        let mut rest = self.0.as_str();

        while let Some((before, after)) = rest.split_once('{') {
            out.push_str(before);
            let Some((name, tail)) = after.split_once('}') else {
                out.push('{');
                rest = after;
                break;
            };
            match placeholder(name, entry) {
                Some(value) => out.push_str(&value),
                None => {
                    let _ = write!(out, "{{{name}}}");
                }
            }
            rest = tail;
        }
        out.push_str(rest);
        out
    }
}

fn placeholder(name: &str, entry: &LogEntry<'_>) -> Option<String> {
    let url = entry.request.url();
    let value = match name {
        "method" => entry.request.method().to_string(),
        "url" => url.to_string(),
        "host" => url.host_str().unwrap_or_default().to_string(),
        "path" => url.path().to_string(),
        "code" => entry
            .response()
            .map_or_else(|| "-".to_string(), |response| response.status().to_string()),
        "req_headers" => headers(entry.request.headers()),
        "res_headers" => entry
            .response()
            .map(|response| headers(response.headers()))
            .unwrap_or_default(),
        "res_body" => entry
            .response()
            .map(|response| String::from_utf8_lossy(response.body()).into_owned())
            .unwrap_or_default(),
        "error" => entry
            .outcome
            .err()
            .map(ToString::to_string)
            .unwrap_or_default(),
        "elapsed_ms" => entry.elapsed.as_millis().to_string(),
        _ => return None,
    };
    Some(value)
}

fn headers(headers: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = headers.iter().collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
