//! Owned text handles.
//!
//! A handle is the raw form of an `Arc<TetherText>`. Whoever receives one
//! from the library holds exactly one strong reference and must give it back
//! through `tether_text_release`. Retaining adds another obligation.

use std::ffi::c_char;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tether_core::Transfer;

static OUTSTANDING: AtomicUsize = AtomicUsize::new(0);

/// Immutable UTF-8 text with a trailing NUL, opaque to C callers.
///
/// Interior NUL bytes are kept; `len` is authoritative, the terminator only
/// makes the common case usable as a C string.
#[derive(Debug)]
pub struct TetherText {
    bytes: Box<[u8]>,
}

impl TetherText {
    fn new(text: String) -> Self {
        let mut bytes = text.into_bytes();
        bytes.push(0);
        OUTSTANDING.fetch_add(1, Ordering::Relaxed);
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    /// The text, or `None` if it was built from invalid UTF-8 (never by this crate).
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    fn as_c_ptr(&self) -> *const c_char {
        self.bytes.as_ptr().cast()
    }
}

impl Drop for TetherText {
    fn drop(&mut self) {
        OUTSTANDING.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Number of text payloads currently alive in the process.
#[must_use]
pub fn outstanding() -> usize {
    OUTSTANDING.load(Ordering::Relaxed)
}

/// Mints handles carrying one strong reference each.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleTransfer;

impl Transfer for HandleTransfer {
    type Token = *mut TetherText;

    fn transfer(&self, text: String) -> *mut TetherText {
        Arc::into_raw(Arc::new(TetherText::new(text))).cast_mut()
    }
}

/// Borrow the text behind a handle.
///
/// # Safety
///
/// `handle` must be null or a live handle minted by this library. The
/// returned reference must not outlive the caller's last release.
pub unsafe fn borrow<'a>(handle: *const TetherText) -> Option<&'a TetherText> {
    // SAFETY: caller guarantees the handle is null or points at a live Arc payload.
    unsafe { handle.as_ref() }
}

/// Add one strong reference.
///
/// # Safety
///
/// `handle` must be null or a live handle minted by this library.
pub unsafe fn retain(handle: *mut TetherText) -> *mut TetherText {
    if !handle.is_null() {
        // SAFETY: live handles come from `Arc::into_raw` and hold at least one reference.
        unsafe { Arc::increment_strong_count(handle.cast_const()) };
    }
    handle
}

/// Drop one strong reference, freeing the text with the last one.
///
/// # Safety
///
/// `handle` must be null or a live handle minted by this library, and the
/// caller must own the reference being released.
pub unsafe fn release(handle: *mut TetherText) {
    if handle.is_null() {
        return;
    }
    // SAFETY: caller gives back exactly one reference obtained from `Arc::into_raw`
    // or `retain`.
    drop(unsafe { Arc::from_raw(handle.cast_const()) });
}

#[must_use]
pub fn text_ptr(text: Option<&TetherText>) -> *const c_char {
    text.map_or(ptr::null(), TetherText::as_c_ptr)
}
