//! C ABI surface of the tether gateway.
//!
//! Every call site shares one signature:
//!
//! ```c
//! int32_t tether_generate(const char *input, const char *config,
//!                         double temperature, int32_t length_cap,
//!                         TetherText **payload_out, TetherText **error_out);
//! ```
//!
//! On return exactly one of `*payload_out` and `*error_out` is non-null:
//! the payload when the status is zero, the error message otherwise. The
//! caller owns the handle it receives and must pass it to
//! `tether_text_release` exactly once.
//!
//! # Caller obligations
//!
//! - `input` must be a valid NUL-terminated string. A null `input` is
//!   undefined behavior.
//! - `config` may be null; null and `""` mean the same thing.
//! - Both output slots must be valid, writable pointers. If either is null
//!   the call returns `-3` without doing anything.
//!
//! The gateway is built on first use from `TetherConfig::load()`. A config
//! that fails to load closes every site; calls then return `-2` with a
//! message naming the config error.

mod logging;
mod text;

use std::ffi::{CStr, c_char};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::OnceLock;

use tether_config::TetherConfig;
use tether_core::{Gateway, GatewayError, RawCall, Reply};
use tether_types::{CallSite, status};

pub use logging::{LOG_ENV, init_tracing};
pub use text::{HandleTransfer, TetherText, outstanding};

const VERSION: &CStr = match CStr::from_bytes_with_nul(
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes(),
) {
    Ok(version) => version,
    Err(_) => c"unknown",
};

fn shared_gateway() -> Result<&'static Gateway, &'static GatewayError> {
    static GATEWAY: OnceLock<Result<Gateway, GatewayError>> = OnceLock::new();
    GATEWAY
        .get_or_init(|| match TetherConfig::load() {
            Ok(config) => Gateway::from_config(&config),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load config; every call site is closed");
                Ok(Gateway::unavailable(format!("configuration error: {e}")))
            }
        })
        .as_ref()
}

/// Run one call against `gateway` and fill the output slots.
///
/// This is the body of every `extern "C"` entry point, exposed so tests and
/// embedders can drive a gateway they built themselves.
///
/// # Safety
///
/// `input` must be a valid NUL-terminated string, `config` null or a valid
/// NUL-terminated string, and `payload_out`/`error_out` null or valid for
/// writes.
#[allow(clippy::too_many_arguments)]
pub unsafe fn call_with(
    gateway: &Gateway,
    site: CallSite,
    input: *const c_char,
    config: *const c_char,
    temperature: f64,
    length_cap: i32,
    payload_out: *mut *mut TetherText,
    error_out: *mut *mut TetherText,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        respond(payload_out, error_out, || {
            if !gateway.gate().is_open(site) {
                return Reply::failure(&GatewayError::unavailable(
                    site,
                    gateway.gate().reason().map(str::to_owned),
                ));
            }
            debug_assert!(!input.is_null(), "input must not be null");
            let input = CStr::from_ptr(input).to_bytes();
            let config = (!config.is_null()).then(|| CStr::from_ptr(config).to_bytes());
            gateway.call(
                site,
                RawCall {
                    input,
                    instructions: config,
                    temperature,
                    length_cap,
                },
            )
        })
    }
}

/// Produce a reply inside a panic guard and write it to the output slots.
unsafe fn respond(
    payload_out: *mut *mut TetherText,
    error_out: *mut *mut TetherText,
    produce: impl FnOnce() -> Reply,
) -> i32 {
    if payload_out.is_null() || error_out.is_null() {
        return status::INVALID_INPUT;
    }
    // SAFETY: both slots were checked non-null and the caller guarantees they are writable.
    unsafe {
        *payload_out = ptr::null_mut();
        *error_out = ptr::null_mut();
    }

    let reply = panic::catch_unwind(AssertUnwindSafe(produce)).unwrap_or_else(|_| {
        tracing::error!("Panic inside gateway call");
        Reply::failure(&GatewayError::NoResult)
    });
    let delivered = reply.deliver(&HandleTransfer);

    // SAFETY: as above.
    unsafe {
        *payload_out = delivered.payload.unwrap_or(ptr::null_mut());
        *error_out = delivered.error.unwrap_or(ptr::null_mut());
    }
    delivered.status
}

#[allow(clippy::too_many_arguments)]
unsafe fn entry(
    site: CallSite,
    input: *const c_char,
    config: *const c_char,
    temperature: f64,
    length_cap: i32,
    payload_out: *mut *mut TetherText,
    error_out: *mut *mut TetherText,
) -> i32 {
    match panic::catch_unwind(shared_gateway) {
        Ok(Ok(gateway)) => {
            // SAFETY: forwarded caller contract.
            unsafe {
                call_with(
                    gateway,
                    site,
                    input,
                    config,
                    temperature,
                    length_cap,
                    payload_out,
                    error_out,
                )
            }
        }
        Ok(Err(err)) => {
            // SAFETY: forwarded caller contract.
            unsafe { respond(payload_out, error_out, || Reply::failure(err)) }
        }
        Err(_) => {
            // SAFETY: forwarded caller contract.
            unsafe {
                respond(payload_out, error_out, || {
                    Reply::failure(&GatewayError::RuntimeUnavailable(
                        "gateway initialization panicked".to_string(),
                    ))
                })
            }
        }
    }
}

/// Generative inference.
///
/// # Safety
///
/// See the crate-level caller obligations.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_generate(
    input: *const c_char,
    config: *const c_char,
    temperature: f64,
    length_cap: i32,
    payload_out: *mut *mut TetherText,
    error_out: *mut *mut TetherText,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        entry(
            CallSite::Inference,
            input,
            config,
            temperature,
            length_cap,
            payload_out,
            error_out,
        )
    }
}

/// Lightweight model invocation.
///
/// # Safety
///
/// See the crate-level caller obligations.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_invoke_model(
    input: *const c_char,
    config: *const c_char,
    temperature: f64,
    length_cap: i32,
    payload_out: *mut *mut TetherText,
    error_out: *mut *mut TetherText,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        entry(
            CallSite::ModelInvocation,
            input,
            config,
            temperature,
            length_cap,
            payload_out,
            error_out,
        )
    }
}

/// Credential issuance. `input` is the challenge, `config` the audience.
/// Temperature and length cap are accepted and ignored.
///
/// # Safety
///
/// See the crate-level caller obligations.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_issue_credential(
    input: *const c_char,
    config: *const c_char,
    temperature: f64,
    length_cap: i32,
    payload_out: *mut *mut TetherText,
    error_out: *mut *mut TetherText,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        entry(
            CallSite::CredentialIssuance,
            input,
            config,
            temperature,
            length_cap,
            payload_out,
            error_out,
        )
    }
}

/// NUL-terminated bytes of a handle, valid until its last release. Null for null.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_text_ptr(handle: *const TetherText) -> *const c_char {
    // SAFETY: forwarded caller contract.
    text::text_ptr(unsafe { text::borrow(handle) })
}

/// Byte length of a handle's text, without the terminator. Zero for null.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_text_len(handle: *const TetherText) -> usize {
    // SAFETY: forwarded caller contract.
    unsafe { text::borrow(handle) }.map_or(0, |text| text.as_bytes().len())
}

/// Add a strong reference; the caller takes on one more release.
///
/// # Safety
///
/// `handle` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_text_retain(handle: *mut TetherText) -> *mut TetherText {
    // SAFETY: forwarded caller contract.
    unsafe { text::retain(handle) }
}

/// Give back one strong reference. Null is a no-op.
///
/// # Safety
///
/// `handle` must be null or a live handle whose reference the caller owns.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn tether_text_release(handle: *mut TetherText) {
    // SAFETY: forwarded caller contract.
    unsafe { text::release(handle) }
}

/// Live text payloads in this process.
#[unsafe(no_mangle)]
pub extern "C" fn tether_text_outstanding() -> usize {
    outstanding()
}

/// 1 if `site` (0 inference, 1 model, 2 credential) can be called, 0 otherwise.
#[unsafe(no_mangle)]
pub extern "C" fn tether_is_available(site: i32) -> i32 {
    let Some(site) = CallSite::from_id(site) else {
        return 0;
    };
    let open = panic::catch_unwind(|| {
        shared_gateway().is_ok_and(|gateway| gateway.is_available(site))
    })
    .unwrap_or(false);
    i32::from(open)
}

/// Install the tracing subscriber. 0 if installed now, 1 if one already was.
///
/// Filter comes from `TETHER_LOG` (default `warn`); output goes to the
/// configured log file or stderr.
#[unsafe(no_mangle)]
pub extern "C" fn tether_init_logging() -> i32 {
    let installed = panic::catch_unwind(|| {
        let config = TetherConfig::load().ok();
        init_tracing("warn", config.as_ref().and_then(TetherConfig::log_file))
    })
    .unwrap_or(false);
    if installed { 0 } else { 1 }
}

/// Static library version. Not owned; never release it.
#[unsafe(no_mangle)]
pub extern "C" fn tether_version() -> *const c_char {
    VERSION.as_ptr()
}
