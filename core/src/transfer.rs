//! Ownership transfer of result text across the call boundary.
//!
//! The gateway never hands raw strings to the ABI layer. It produces a
//! [`Reply`] holding exactly one owned string (payload or error message) and
//! the ABI layer converts it into tokens through a [`Transfer`]
//! implementation. [`Reply::deliver`] consumes the reply, so each logical
//! output is transferred exactly once and the gateway keeps no reference to it
//! afterwards.
//!
//! What happens to a token after delivery (release, leak, double release) is
//! the receiver's business. This module can only guarantee it never mints zero
//! or two tokens for one output; tests observe the rest through a counting
//! `Transfer` double.

use tether_types::{NonEmptyStaticStr, NonEmptyString, status};

use crate::GatewayError;

const MISSING_MESSAGE: NonEmptyStaticStr =
    NonEmptyStaticStr::new("the capability failed without a message");

/// Converts an owned string into a token the receiving side is responsible for.
pub trait Transfer {
    type Token;

    /// Hand over `text` with exactly one release obligation attached.
    fn transfer(&self, text: String) -> Self::Token;
}

/// The result of one call before it crosses the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Payload(String),
    Error { status: i32, message: NonEmptyString },
}

/// Status plus output slots after transfer.
///
/// Exactly one of `payload` and `error` is `Some`: `payload` when `status` is
/// zero, `error` otherwise.
#[derive(Debug, PartialEq, Eq)]
pub struct Delivered<T> {
    pub status: i32,
    pub payload: Option<T>,
    pub error: Option<T>,
}

impl Reply {
    #[must_use]
    pub fn failure(error: &GatewayError) -> Self {
        Reply::Error {
            status: error.status(),
            message: NonEmptyString::or_static(error.to_string(), MISSING_MESSAGE),
        }
    }

    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            Reply::Payload(_) => status::SUCCESS,
            Reply::Error { status, .. } => *status,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Payload(_))
    }

    /// Transfer the single owned string and report which slot it belongs in.
    pub fn deliver<T: Transfer>(self, transfer: &T) -> Delivered<T::Token> {
        match self {
            Reply::Payload(payload) => Delivered {
                status: status::SUCCESS,
                payload: Some(transfer.transfer(payload)),
                error: None,
            },
            Reply::Error { status, message } => Delivered {
                status,
                payload: None,
                error: Some(transfer.transfer(message.into_inner())),
            },
        }
    }
}

impl From<Result<String, GatewayError>> for Reply {
    fn from(result: Result<String, GatewayError>) -> Self {
        match result {
            Ok(payload) => Reply::Payload(payload),
            Err(error) => Reply::failure(&error),
        }
    }
}
