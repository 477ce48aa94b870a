//! Blocking bridge onto the asynchronous capabilities.
//!
//! Every call gets its own single-use completion channel. The capability runs
//! as a task on the dispatcher's runtime and sends its outcome exactly once;
//! the calling thread blocks on the receiving half until then. The runtime is
//! never the caller's thread, so a blocked caller can't starve the task it is
//! waiting for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tokio::sync::oneshot;
use tracing::Instrument;

use tether_providers::Capability;
use tether_types::{InvocationOutcome, InvocationRequest};

use crate::GatewayError;

const THREAD_NAME: &str = "tether-dispatch";

enum Completion {
    Finished(InvocationOutcome),
    TimedOut(Duration),
}

/// Owns the async runtime capabilities execute on.
///
/// Dropping a dispatcher shuts its runtime down in the background, so it can
/// be dropped from any thread, async context included. Tasks still in flight
/// are abandoned and their callers see [`GatewayError::NoResult`].
#[derive(Debug)]
pub struct Dispatcher {
    handle: Handle,
    runtime: Option<Runtime>,
    dispatched: AtomicU64,
}

impl Dispatcher {
    /// Build a dedicated multi-threaded runtime.
    ///
    /// `worker_threads` of `None` uses tokio's default (one per core).
    pub fn new(worker_threads: Option<usize>) -> Result<Self, GatewayError> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(THREAD_NAME);
        if let Some(threads) = worker_threads {
            builder.worker_threads(threads);
        }
        let runtime = builder
            .build()
            .map_err(|e| GatewayError::RuntimeUnavailable(e.to_string()))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            dispatched: AtomicU64::new(0),
        })
    }

    /// Process-wide dispatcher, created on first use.
    ///
    /// The first caller's `worker_threads` wins; later arguments are ignored.
    /// A construction failure is remembered and returned to every caller.
    pub fn shared(worker_threads: Option<usize>) -> Result<Arc<Self>, GatewayError> {
        static SHARED: OnceLock<Result<Arc<Dispatcher>, String>> = OnceLock::new();
        SHARED
            .get_or_init(|| {
                Dispatcher::new(worker_threads)
                    .map(Arc::new)
                    .map_err(|e| e.to_string())
            })
            .clone()
            .map_err(GatewayError::RuntimeUnavailable)
    }

    /// Number of invocations handed to the runtime so far.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Run one invocation and block the calling thread until it finishes.
    ///
    /// Returns the capability's own outcome (success or domain failure). The
    /// error side covers what the gateway observed instead of an outcome: the
    /// task ended without sending one (it panicked), or `timeout` elapsed.
    ///
    /// The current tracing span follows the task onto the runtime.
    pub fn dispatch(
        &self,
        capability: Arc<dyn Capability>,
        request: InvocationRequest,
        timeout: Option<Duration>,
    ) -> Result<InvocationOutcome, GatewayError> {
        let (tx, rx) = oneshot::channel();
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        let task = async move {
            let invocation = capability.invoke(&request);
            let completion = match timeout {
                Some(limit) => match tokio::time::timeout(limit, invocation).await {
                    Ok(result) => Completion::Finished(result.into()),
                    Err(_) => Completion::TimedOut(limit),
                },
                None => Completion::Finished(invocation.await.into()),
            };
            if tx.send(completion).is_err() {
                tracing::warn!(capability = capability.name(), "Caller stopped waiting for result");
            }
        };
        self.handle.spawn(task.in_current_span());

        match wait_for(rx) {
            Some(Completion::Finished(outcome)) => Ok(outcome),
            Some(Completion::TimedOut(limit)) => Err(GatewayError::TimedOut(limit)),
            None => {
                tracing::warn!("Capability task ended without a result");
                Err(GatewayError::NoResult)
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Block until the completion arrives or its sender is dropped.
///
/// Safe to call from any thread. Inside a multi-threaded tokio runtime the
/// worker is handed off with `block_in_place`; inside a current-thread runtime
/// (where that is not allowed) the wait moves to a scoped helper thread.
fn wait_for<T: Send>(rx: oneshot::Receiver<T>) -> Option<T> {
    match Handle::try_current() {
        Ok(handle) if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) => {
            tokio::task::block_in_place(|| rx.blocking_recv().ok())
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(move || rx.blocking_recv().ok())
                .join()
                .ok()
                .flatten()
        }),
        Err(_) => rx.blocking_recv().ok(),
    }
}
