//! Per-site availability, decided once at gateway construction.

use std::sync::atomic::{AtomicU8, Ordering};

use tether_types::CallSite;

const fn bit(site: CallSite) -> u8 {
    1u8 << site.id()
}

/// Which call sites this deployment can serve.
///
/// Built once and never mutated afterwards, so concurrent readers agree.
/// The atomic keeps `is_open` lock-free on the hot path.
#[derive(Debug)]
pub struct AvailabilityGate {
    open: AtomicU8,
    reason: Option<String>,
}

impl AvailabilityGate {
    pub fn new(sites: impl IntoIterator<Item = CallSite>) -> Self {
        let mask = sites.into_iter().fold(0u8, |mask, site| mask | bit(site));
        Self {
            open: AtomicU8::new(mask),
            reason: None,
        }
    }

    /// Every site open.
    #[must_use]
    pub fn all_open() -> Self {
        Self::new(CallSite::all().iter().copied())
    }

    /// Every site closed, remembering why for the error message.
    #[must_use]
    pub fn closed(reason: impl Into<String>) -> Self {
        Self {
            open: AtomicU8::new(0),
            reason: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn is_open(&self, site: CallSite) -> bool {
        self.open.load(Ordering::Acquire) & bit(site) != 0
    }

    /// Why sites are closed, when that is known.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    #[must_use]
    pub fn open_sites(&self) -> Vec<CallSite> {
        CallSite::all()
            .iter()
            .copied()
            .filter(|site| self.is_open(*site))
            .collect()
    }
}
