use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The capabilities reachable through the gateway.
///
/// All three share one ABI contract; they differ only in which service route
/// handles the request and which request fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSite {
    /// On-device generative inference.
    Inference,
    /// Lightweight model invocation (classification, embedding-style calls).
    ModelInvocation,
    /// Credential issuance / attestation.
    CredentialIssuance,
}

#[derive(Debug, Error)]
#[error("unknown call site: {0}")]
pub struct UnknownSiteError(pub String);

impl CallSite {
    /// Stable numeric identifier used by `tether_is_available`.
    #[must_use]
    pub const fn id(self) -> i32 {
        match self {
            CallSite::Inference => 0,
            CallSite::ModelInvocation => 1,
            CallSite::CredentialIssuance => 2,
        }
    }

    #[must_use]
    pub const fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(CallSite::Inference),
            1 => Some(CallSite::ModelInvocation),
            2 => Some(CallSite::CredentialIssuance),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CallSite::Inference => "inference",
            CallSite::ModelInvocation => "model",
            CallSite::CredentialIssuance => "credential",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            CallSite::Inference => "Generative inference",
            CallSite::ModelInvocation => "Model invocation",
            CallSite::CredentialIssuance => "Credential issuance",
        }
    }

    /// Path of the service endpoint handling this site, relative to the base URL.
    #[must_use]
    pub const fn route(self) -> &'static str {
        match self {
            CallSite::Inference => "v1/generate",
            CallSite::ModelInvocation => "v1/invoke",
            CallSite::CredentialIssuance => "v1/credentials",
        }
    }

    /// Whether sampling temperature and length cap are forwarded to the service.
    #[must_use]
    pub const fn uses_sampling(self) -> bool {
        !matches!(self, CallSite::CredentialIssuance)
    }

    /// Parse a site from its config/CLI spelling.
    pub fn parse(raw: &str) -> Result<Self, UnknownSiteError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inference" | "generate" => Ok(CallSite::Inference),
            "model" | "invoke" | "model_invocation" => Ok(CallSite::ModelInvocation),
            "credential" | "credentials" | "credential_issuance" => {
                Ok(CallSite::CredentialIssuance)
            }
            _ => Err(UnknownSiteError(raw.trim().to_string())),
        }
    }

    #[must_use]
    pub const fn all() -> &'static [CallSite] {
        &[
            CallSite::Inference,
            CallSite::ModelInvocation,
            CallSite::CredentialIssuance,
        ]
    }
}

impl std::fmt::Display for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
