//! Shared test utilities and fixtures
//!
//! A scripted capability double, gateway builders, a helper that drives the
//! C entry point exactly like a foreign caller, and mock service responses.

#![allow(dead_code)]

use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tether::{TetherText, call_with, tether_text_len, tether_text_ptr, tether_text_release};
use tether_core::{Dispatcher, Gateway};
use tether_providers::{Capability, CapabilityFut};
use tether_types::{CallSite, CapabilityFailure, InvocationRequest};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// What a [`ScriptedCapability`] does on every invocation.
#[derive(Debug, Clone)]
pub enum Script {
    /// Return this payload.
    Succeed(String),
    /// Return `"{site}:{input}"`.
    Echo,
    /// Fail with this code and message.
    Fail { code: Option<i32>, message: String },
    /// Panic inside the async task.
    Panic,
}

/// Capability double: follows a script, optionally after a delay, and records
/// every request and invocation.
pub struct ScriptedCapability {
    site: CallSite,
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl ScriptedCapability {
    pub fn new(site: CallSite, script: Script) -> Self {
        Self {
            site,
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn succeed(site: CallSite, payload: &str) -> Arc<Self> {
        Arc::new(Self::new(site, Script::Succeed(payload.to_string())))
    }

    pub fn fail(site: CallSite, code: Option<i32>, message: &str) -> Arc<Self> {
        Arc::new(Self::new(
            site,
            Script::Fail {
                code,
                message: message.to_string(),
            },
        ))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<InvocationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Capability for ScriptedCapability {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn site(&self) -> CallSite {
        self.site
    }

    fn invoke<'a>(&'a self, request: &'a InvocationRequest) -> CapabilityFut<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.script {
                Script::Succeed(payload) => Ok(payload.clone()),
                Script::Echo => Ok(format!("{}:{}", self.site, request.input())),
                Script::Fail { code, message } => {
                    Err(CapabilityFailure::new(*code, message.clone()))
                }
                Script::Panic => panic!("scripted panic"),
            }
        })
    }
}

/// A fresh dispatcher owned by one test.
pub fn dispatcher() -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(Some(2)).unwrap())
}

pub fn gateway_with(capabilities: &[Arc<ScriptedCapability>]) -> Gateway {
    capabilities
        .iter()
        .fold(Gateway::builder(dispatcher()), |builder, capability| {
            builder.capability(Arc::clone(capability) as Arc<dyn Capability>)
        })
        .build()
}

/// Both output slots after one ABI call, decoded and released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiReply {
    pub status: i32,
    pub payload: Option<String>,
    pub error: Option<String>,
}

impl AbiReply {
    /// Exactly one slot populated, and the right one for the status.
    pub fn assert_one_slot(&self) {
        assert!(
            self.payload.is_some() != self.error.is_some(),
            "exactly one slot must be set: {self:?}"
        );
        assert_eq!(self.status == 0, self.payload.is_some(), "{self:?}");
    }
}

fn take(handle: *mut TetherText) -> Option<String> {
    if handle.is_null() {
        return None;
    }
    unsafe {
        let len = tether_text_len(handle);
        let bytes = std::slice::from_raw_parts(tether_text_ptr(handle).cast::<u8>(), len);
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        tether_text_release(handle);
        Some(text)
    }
}

/// Drive `call_with` with C strings, as a foreign caller would.
pub fn call_c(
    gateway: &Gateway,
    site: CallSite,
    input: &CStr,
    config: Option<&CStr>,
    temperature: f64,
    length_cap: i32,
) -> AbiReply {
    let mut payload = ptr::null_mut();
    let mut error = ptr::null_mut();
    let status = unsafe {
        call_with(
            gateway,
            site,
            input.as_ptr(),
            config.map_or(ptr::null(), CStr::as_ptr),
            temperature,
            length_cap,
            &mut payload,
            &mut error,
        )
    };
    AbiReply {
        status,
        payload: take(payload),
        error: take(error),
    }
}

pub fn call(
    gateway: &Gateway,
    site: CallSite,
    input: &str,
    config: Option<&str>,
    temperature: f64,
    length_cap: i32,
) -> AbiReply {
    let input = CString::new(input).unwrap();
    let config = config.map(|c| CString::new(c).unwrap());
    call_c(
        gateway,
        site,
        &input,
        config.as_deref(),
        temperature,
        length_cap,
    )
}

/// Mount a successful service response on `route`.
pub async fn mount_output(server: &MockServer, route: &str, output: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/{route}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "output": output
        })))
        .mount(server)
        .await;
}

/// Mount a service error response with an optional domain code.
pub async fn mount_error(
    server: &MockServer,
    route: &str,
    status: u16,
    code: Option<i64>,
    message: &str,
) {
    let mut error = serde_json::json!({ "message": message });
    if let Some(code) = code {
        error["code"] = serde_json::json!(code);
    }
    Mock::given(method("POST"))
        .and(path(format!("/{route}")))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "error": error
        })))
        .mount(server)
        .await;
}

/// Config text pointing every site at `server`, with retries off.
pub fn config_for(server: &MockServer, extra: &str) -> String {
    format!(
        r#"
{extra}

[service]
base_url = "{}"

[retry]
max_retries = 0
"#,
        server.uri()
    )
}
