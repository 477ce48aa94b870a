//! Reserved gateway status codes.
//!
//! Zero is success. The small negative values below are produced by the gateway
//! itself; every other non-zero status is a domain failure code passed through
//! verbatim from the wrapped capability.

/// Call succeeded; the payload slot is populated.
pub const SUCCESS: i32 = 0;

/// Failure without a usable domain code (absent or zero), or no result at all.
pub const GENERIC_FAILURE: i32 = -1;

/// The capability is not available on this deployment. Nothing was dispatched.
pub const CAPABILITY_UNAVAILABLE: i32 = -2;

/// Caller input was present but malformed (bad encoding, bad temperature).
pub const INVALID_INPUT: i32 = -3;

/// The configured dispatch timeout elapsed before the capability finished.
pub const TIMED_OUT: i32 = -4;
