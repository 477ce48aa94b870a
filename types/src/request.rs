//! Invocation request types.
//!
//! These types make invalid request shapes unrepresentable: a temperature is
//! always finite and non-negative, a length cap is either absent or positive,
//! and blank instructions never survive construction.

use std::num::NonZeroU32;

use thiserror::Error;

use crate::CallSite;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("temperature must be a finite, non-negative number (got {0})")]
    Temperature(f64),
}

/// Validated sampling temperature.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Temperature(f64);

impl Temperature {
    pub const ZERO: Self = Self(0.0);

    pub fn new(value: f64) -> Result<Self, RequestError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(RequestError::Temperature(value))
        }
    }

    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }
}

/// Token/length cap for a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthCap {
    #[default]
    Unbounded,
    Tokens(NonZeroU32),
}

impl LengthCap {
    /// Normalize a raw ABI cap: zero and negative values mean "no cap".
    #[must_use]
    pub fn from_raw(raw: i32) -> Self {
        u32::try_from(raw)
            .ok()
            .and_then(NonZeroU32::new)
            .map_or(LengthCap::Unbounded, LengthCap::Tokens)
    }

    #[must_use]
    pub const fn tokens(self) -> Option<u32> {
        match self {
            LengthCap::Unbounded => None,
            LengthCap::Tokens(n) => Some(n.get()),
        }
    }
}

/// One call's worth of caller input, decoded and validated.
///
/// Constructed fresh per call and owned by the gateway for the call's duration.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    site: CallSite,
    input: String,
    instructions: Option<String>,
    temperature: Temperature,
    length_cap: LengthCap,
}

impl InvocationRequest {
    /// Build a request.
    ///
    /// An empty `instructions` string is folded into `None`, so "absent" and
    /// "present but empty" configuration produce the same request.
    #[must_use]
    pub fn new(
        site: CallSite,
        input: impl Into<String>,
        instructions: Option<String>,
        temperature: Temperature,
        length_cap: LengthCap,
    ) -> Self {
        Self {
            site,
            input: input.into(),
            instructions: instructions.filter(|text| !text.is_empty()),
            temperature,
            length_cap,
        }
    }

    #[must_use]
    pub const fn site(&self) -> CallSite {
        self.site
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    #[must_use]
    pub const fn temperature(&self) -> Temperature {
        self.temperature
    }

    #[must_use]
    pub const fn length_cap(&self) -> LengthCap {
        self.length_cap
    }
}
