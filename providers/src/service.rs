//! HTTP client for the inference/attestation service.
//!
//! Each call site maps to one route under the service base URL:
//!
//! | Site | Route |
//! |------|-------|
//! | inference | `POST {base}/v1/generate` |
//! | model invocation | `POST {base}/v1/invoke` |
//! | credential issuance | `POST {base}/v1/credentials` |
//!
//! Request bodies are JSON; a fresh body is built per call and nothing is
//! cached between calls. Successful responses carry `{"output": "..."}`,
//! failures carry `{"error": {"code": 123, "message": "..."}}`.

use std::fmt;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tether_types::{CallSite, CapabilityFailure, InvocationRequest, truncate_with_ellipsis};

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::{Capability, CapabilityFut, http_client};

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;
const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;
const MAX_ERROR_MESSAGE_CHARS: usize = 512;

/// Connection settings shared by every site's capability.
#[derive(Clone)]
pub struct ServiceSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

// Manual Debug impl to prevent leaking the API key in logs.
impl fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ServiceSettings {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn endpoint(&self, site: CallSite) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), site.route())
    }
}

/// Service-backed capability for one call site.
#[derive(Debug, Clone)]
pub struct ServiceCapability {
    site: CallSite,
    endpoint: String,
    settings: ServiceSettings,
}

#[derive(Debug, Serialize)]
struct RequestBody<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> RequestBody<'a> {
    fn from_request(request: &'a InvocationRequest) -> Self {
        let sampling = request.site().uses_sampling();
        Self {
            input: request.input(),
            instructions: request.instructions(),
            temperature: sampling.then(|| request.temperature().as_f64()),
            max_tokens: if sampling {
                request.length_cap().tokens()
            } else {
                None
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct SuccessBody {
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<i64>,
    message: Option<String>,
}

impl ServiceCapability {
    #[must_use]
    pub fn new(site: CallSite, settings: ServiceSettings) -> Self {
        Self {
            site,
            endpoint: settings.endpoint(site),
            settings,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, request: &InvocationRequest) -> Result<String, CapabilityFailure> {
        let body = RequestBody::from_request(request);
        let client = http_client();
        let build = || {
            let builder = client
                .post(&self.endpoint)
                .timeout(self.settings.request_timeout)
                .json(&body);
            match &self.settings.api_key {
                Some(key) => builder.bearer_auth(key),
                None => builder,
            }
        };

        match send_with_retry(build, &self.settings.retry).await {
            RetryOutcome::Success(response) => read_success(response).await,
            RetryOutcome::HttpError(response) => Err(read_failure(response).await),
            RetryOutcome::ConnectionError { attempts, source } => {
                tracing::warn!(site = %self.site, attempts, error = %source, "Service unreachable");
                Err(CapabilityFailure::uncoded(format!(
                    "request failed after {attempts} attempts: {source}"
                )))
            }
        }
    }
}

impl Capability for ServiceCapability {
    fn name(&self) -> &'static str {
        "service"
    }

    fn site(&self) -> CallSite {
        self.site
    }

    fn invoke<'a>(&'a self, request: &'a InvocationRequest) -> CapabilityFut<'a> {
        Box::pin(self.call(request))
    }
}

/// Read at most `limit` bytes of a response body.
///
/// Returns the bytes read and whether the body was cut short. A transport
/// error partway through is a failure of its own.
async fn read_capped(
    mut response: Response,
    limit: usize,
) -> Result<(Vec<u8>, bool), CapabilityFailure> {
    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                body.extend_from_slice(&chunk);
                if body.len() > limit {
                    body.truncate(limit);
                    return Ok((body, true));
                }
            }
            Ok(None) => return Ok((body, false)),
            Err(e) => {
                return Err(CapabilityFailure::uncoded(format!(
                    "failed to read service response: {e}"
                )));
            }
        }
    }
}

async fn read_success(response: Response) -> Result<String, CapabilityFailure> {
    let (body, truncated) = read_capped(response, MAX_RESPONSE_BYTES).await?;
    if truncated {
        return Err(CapabilityFailure::uncoded(format!(
            "service response exceeded {MAX_RESPONSE_BYTES} bytes"
        )));
    }
    let parsed: SuccessBody = serde_json::from_slice(&body).map_err(|e| {
        CapabilityFailure::uncoded(format!("service returned an unreadable response: {e}"))
    })?;
    parsed
        .output
        .ok_or_else(|| CapabilityFailure::uncoded("service response is missing `output`"))
}

async fn read_failure(response: Response) -> CapabilityFailure {
    let status = response.status();
    match read_capped(response, MAX_ERROR_BODY_BYTES).await {
        Ok((body, truncated)) => failure_from_body(status, &body, truncated),
        Err(failure) => failure,
    }
}

fn failure_from_body(status: StatusCode, body: &[u8], truncated: bool) -> CapabilityFailure {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        let code = parsed
            .error
            .code
            .and_then(|code| i32::try_from(code).ok());
        let message = parsed
            .error
            .message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("service error {status}"));
        return CapabilityFailure::new(
            code,
            truncate_with_ellipsis(&message, MAX_ERROR_MESSAGE_CHARS),
        );
    }

    let text = String::from_utf8_lossy(body);
    let text = truncate_with_ellipsis(&text, MAX_ERROR_MESSAGE_CHARS);
    let suffix = if truncated { "...(truncated)" } else { "" };
    if text.is_empty() {
        CapabilityFailure::uncoded(format!("service error {status}"))
    } else {
        CapabilityFailure::uncoded(format!("service error {status}: {text}{suffix}"))
    }
}
