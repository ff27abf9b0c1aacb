//! Response eligibility capability.

use crate::{Request, Response};

/// Message used when a rejection carries none.
pub const DEFAULT_INELIGIBLE_MESSAGE: &str = "Unsuccessful request";

/// Verdict of an [`EligibilityChecker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// The response is accepted unchanged.
    Eligible,
    /// The response is rejected, optionally with a message.
    ///
    /// An empty message counts as acceptance; a missing one falls back to
    /// [`DEFAULT_INELIGIBLE_MESSAGE`].
    Ineligible(Option<String>),
}

impl Eligibility {
    /// Rejection with a message.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Ineligible(Some(message.into()))
    }

    /// The message the call fails with, or `None` if the response is accepted.
    #[must_use]
    pub fn rejection_message(self) -> Option<String> {
        match self {
            Self::Eligible => None,
            Self::Ineligible(None) => Some(DEFAULT_INELIGIBLE_MESSAGE.to_string()),
            Self::Ineligible(Some(message)) if message.is_empty() => None,
            Self::Ineligible(Some(message)) => Some(message),
        }
    }
}

/// Client-specific rule that can reject a transport-successful response.
///
/// Supplying a checker when building the client installs the `eligibility`
/// middleware.
///
/// # Example
///
/// ```ignore
/// use tether::{Eligibility, EligibilityChecker, Request, Response};
///
/// struct ErrCode;
///
/// impl EligibilityChecker for ErrCode {
///     fn is_not_eligible_response(&self, response: &Response, _request: &Request) -> Eligibility {
///         match response.json::<serde_json::Value>() {
///             Ok(body) if body["errcode"].as_i64().unwrap_or(0) != 0 => {
///                 Eligibility::rejected(body["errmsg"].as_str().unwrap_or_default())
///             }
///             _ => Eligibility::Eligible,
///         }
///     }
/// }
/// ```
pub trait EligibilityChecker: Send + Sync + 'static {
    /// Classify `response`, obtained for `request`.
    fn is_not_eligible_response(&self, response: &Response, request: &Request) -> Eligibility;
}

impl<F> EligibilityChecker for F
where
    F: Fn(&Response, &Request) -> Eligibility + Send + Sync + 'static,
{
    fn is_not_eligible_response(&self, response: &Response, request: &Request) -> Eligibility {
        self(response, request)
    }
}

/// Rejects every response whose status is not 2xx.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuccessStatus;

impl EligibilityChecker for SuccessStatus {
    fn is_not_eligible_response(&self, response: &Response, _request: &Request) -> Eligibility {
        if response.is_success() {
            Eligibility::Eligible
        } else {
            Eligibility::rejected(format!(
                "request failed with status {}",
                response.status()
            ))
        }
    }
}
