//! Capabilities reachable through the tether gateway.
//!
//! # Architecture
//!
//! - [`Capability`] - the asynchronous seam the gateway dispatches into. One
//!   implementation per backing service; test doubles implement it directly.
//! - [`service`] - production implementation: an HTTP client for the local
//!   inference/attestation service, one [`ServiceCapability`] per call site.
//! - [`retry`] - retry policy shared by every outbound request.
//!
//! # Error Handling
//!
//! Capabilities never panic on service errors. Every failure, including
//! transport failures after retries, is reported as a [`CapabilityFailure`]
//! carrying the service's domain code when one was supplied.

pub mod retry;
pub mod service;

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::time::Duration;

pub use service::{ServiceCapability, ServiceSettings};
pub use tether_types;
use tether_types::{CallSite, CapabilityFailure, InvocationRequest};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 32;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Capability invocation future type alias.
pub type CapabilityFut<'a> =
    Pin<Box<dyn Future<Output = Result<String, CapabilityFailure>> + Send + 'a>>;

/// An asynchronous native capability the gateway can invoke.
///
/// Implementations must be shareable across calls: the gateway holds one
/// instance per call site for the life of the process and invokes it
/// concurrently from many in-flight calls.
pub trait Capability: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The call site this capability serves.
    fn site(&self) -> CallSite;

    /// Run one invocation to completion.
    fn invoke<'a>(&'a self, request: &'a InvocationRequest) -> CapabilityFut<'a>;
}

/// Process-wide HTTP client, built on first use.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
            .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build tuned HTTP client: {e}. Using defaults.");
                reqwest::Client::new()
            })
    })
}
