//! Gateway failure kinds and their boundary status codes.

use std::time::Duration;

use thiserror::Error;

use tether_types::{CallSite, CapabilityFailure, RequestError, status};

/// Everything that can stop a call from producing a payload.
///
/// Each variant maps to exactly one status code through [`GatewayError::status`];
/// the `Display` text becomes the error message handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{} is not available on this deployment{}", .site.display_name(), detail_suffix(.detail.as_deref()))]
    CapabilityUnavailable {
        site: CallSite,
        detail: Option<String>,
    },

    #[error("the invocation completed without producing a result")]
    NoResult,

    #[error(transparent)]
    Underlying(#[from] CapabilityFailure),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("the invocation did not finish within {} ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("async runtime unavailable: {0}")]
    RuntimeUnavailable(String),
}

fn detail_suffix(detail: Option<&str>) -> String {
    match detail {
        Some(detail) if !detail.trim().is_empty() => format!(" ({detail})"),
        _ => String::new(),
    }
}

impl GatewayError {
    #[must_use]
    pub fn unavailable(site: CallSite, detail: Option<String>) -> Self {
        GatewayError::CapabilityUnavailable { site, detail }
    }

    /// The status code reported across the boundary.
    ///
    /// Domain codes from the capability pass through verbatim; a failure
    /// without a code reports the generic failure status.
    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            GatewayError::CapabilityUnavailable { .. } => status::CAPABILITY_UNAVAILABLE,
            GatewayError::NoResult | GatewayError::RuntimeUnavailable(_) => {
                status::GENERIC_FAILURE
            }
            GatewayError::Underlying(failure) => failure.code().unwrap_or(status::GENERIC_FAILURE),
            GatewayError::InvalidInput(_) => status::INVALID_INPUT,
            GatewayError::TimedOut(_) => status::TIMED_OUT,
        }
    }
}

impl From<RequestError> for GatewayError {
    fn from(err: RequestError) -> Self {
        GatewayError::InvalidInput(err.to_string())
    }
}
