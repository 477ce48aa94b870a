//! Gateway core: decode one call, dispatch it, shape the reply.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use tether_config::TetherConfig;
use tether_providers::{Capability, ServiceCapability};
use tether_types::{CallSite, InvocationOutcome, InvocationRequest, LengthCap, Temperature};

use crate::{AvailabilityGate, Dispatcher, GatewayError, Reply};

/// One call's raw arguments as they arrived at the boundary.
///
/// Text is still bytes here; [`RawCall::decode`] is the only place they become
/// a validated [`InvocationRequest`].
#[derive(Debug, Clone, Copy)]
pub struct RawCall<'a> {
    pub input: &'a [u8],
    pub instructions: Option<&'a [u8]>,
    pub temperature: f64,
    pub length_cap: i32,
}

impl<'a> RawCall<'a> {
    #[must_use]
    pub fn text(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            instructions: None,
            temperature: 0.0,
            length_cap: 0,
        }
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: &'a str) -> Self {
        self.instructions = Some(instructions.as_bytes());
        self
    }

    #[must_use]
    pub fn with_sampling(mut self, temperature: f64, length_cap: i32) -> Self {
        self.temperature = temperature;
        self.length_cap = length_cap;
        self
    }

    /// Validate and copy the call's arguments into an owned request.
    ///
    /// Absent and empty instructions are the same thing. A length cap of zero
    /// or below means no cap. Sites that don't sample ignore temperature and
    /// length cap entirely, so neither can fail the call there.
    pub fn decode(self, site: CallSite) -> Result<InvocationRequest, GatewayError> {
        let input = std::str::from_utf8(self.input)
            .map_err(|e| GatewayError::InvalidInput(format!("input is not valid UTF-8: {e}")))?;
        let instructions = self
            .instructions
            .map(std::str::from_utf8)
            .transpose()
            .map_err(|e| {
                GatewayError::InvalidInput(format!("instructions are not valid UTF-8: {e}"))
            })?
            .map(str::to_owned);
        let (temperature, length_cap) = if site.uses_sampling() {
            (
                Temperature::new(self.temperature)?,
                LengthCap::from_raw(self.length_cap),
            )
        } else {
            (Temperature::ZERO, LengthCap::Unbounded)
        };
        Ok(InvocationRequest::new(
            site,
            input,
            instructions,
            temperature,
            length_cap,
        ))
    }
}

/// Routes calls for every site through one dispatcher.
///
/// The gateway holds no per-call state: each call decodes its own request,
/// gets its own id and completion channel, and leaves nothing behind.
pub struct Gateway {
    gate: AvailabilityGate,
    capabilities: HashMap<CallSite, Arc<dyn Capability>>,
    dispatcher: Option<Arc<Dispatcher>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("gate", &self.gate)
            .field("sites", &self.capabilities.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    #[must_use]
    pub fn builder(dispatcher: Arc<Dispatcher>) -> GatewayBuilder {
        GatewayBuilder {
            dispatcher: Some(dispatcher),
            capabilities: HashMap::new(),
            gate: None,
            timeout: None,
        }
    }

    /// Build the production gateway: one HTTP capability per enabled site on
    /// the shared dispatcher.
    pub fn from_config(config: &TetherConfig) -> Result<Self, GatewayError> {
        let dispatcher = Dispatcher::shared(config.worker_threads())?;
        let mut builder = Self::builder(dispatcher).timeout(config.dispatch_timeout());

        let enabled = match config.enabled_sites() {
            Ok(enabled) => enabled,
            Err(e) => return Ok(builder.gate(AvailabilityGate::closed(e.to_string())).build()),
        };
        if let Some(settings) = config.service_settings() {
            for site in &enabled {
                builder = builder.capability(Arc::new(ServiceCapability::new(
                    *site,
                    settings.clone(),
                )));
            }
        }
        if enabled.is_empty() {
            builder = builder.gate(AvailabilityGate::closed("no service is configured"));
        }
        Ok(builder.build())
    }

    /// A gateway that refuses every call, used when configuration failed.
    ///
    /// It never dispatches, so it holds no runtime and can't fail to build.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            gate: AvailabilityGate::closed(reason),
            capabilities: HashMap::new(),
            dispatcher: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn gate(&self) -> &AvailabilityGate {
        &self.gate
    }

    #[must_use]
    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        self.dispatcher.as_deref()
    }

    /// Invocations this gateway's dispatcher has run; zero without one.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatcher.as_deref().map_or(0, Dispatcher::dispatched)
    }

    #[must_use]
    pub fn is_available(&self, site: CallSite) -> bool {
        self.gate.is_open(site) && self.capabilities.contains_key(&site)
    }

    /// Run one call to completion on the calling thread.
    ///
    /// Never panics on capability failure; every outcome, including an
    /// unavailable site, is a [`Reply`].
    pub fn call(&self, site: CallSite, raw: RawCall<'_>) -> Reply {
        let call_id = Uuid::new_v4();
        let span = tracing::info_span!("tether_call", site = site.as_str(), %call_id);
        let _entered = span.enter();
        let started = Instant::now();

        let reply = Reply::from(self.run(site, raw));
        match &reply {
            Reply::Payload(payload) => tracing::debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                payload_len = payload.len(),
                "Call completed"
            ),
            Reply::Error { status, message } => tracing::warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                status,
                message_len = message.len(),
                "Call failed"
            ),
        }
        reply
    }

    fn run(&self, site: CallSite, raw: RawCall<'_>) -> Result<String, GatewayError> {
        let unavailable =
            || GatewayError::unavailable(site, self.gate.reason().map(str::to_owned));
        let capability = self
            .capabilities
            .get(&site)
            .filter(|_| self.gate.is_open(site))
            .ok_or_else(unavailable)?;
        let dispatcher = self.dispatcher.as_ref().ok_or_else(unavailable)?;

        let request = raw.decode(site)?;
        tracing::debug!(
            capability = capability.name(),
            input_len = request.input().len(),
            has_instructions = request.instructions().is_some(),
            "Dispatching"
        );

        match dispatcher.dispatch(Arc::clone(capability), request, self.timeout)? {
            InvocationOutcome::Success(payload) => Ok(payload),
            InvocationOutcome::Failure(failure) => Err(failure.into()),
        }
    }
}

#[must_use]
pub struct GatewayBuilder {
    dispatcher: Option<Arc<Dispatcher>>,
    capabilities: HashMap<CallSite, Arc<dyn Capability>>,
    gate: Option<AvailabilityGate>,
    timeout: Option<Duration>,
}

impl GatewayBuilder {
    /// Register the capability for its site, replacing any earlier one.
    pub fn capability(mut self, capability: Arc<dyn Capability>) -> Self {
        self.capabilities.insert(capability.site(), capability);
        self
    }

    /// Override the gate. By default exactly the registered sites are open.
    pub fn gate(mut self, gate: AvailabilityGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Gateway {
        let gate = self
            .gate
            .unwrap_or_else(|| AvailabilityGate::new(self.capabilities.keys().copied()));
        Gateway {
            gate,
            capabilities: self.capabilities,
            dispatcher: self.dispatcher,
            timeout: self.timeout,
        }
    }
}
