//! Error types for the toolchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`LoopFailure`] is the
//! taxonomy the control loop converts into conversational fallback turns.

use thiserror::Error;

// --- Provider and capability errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Capability already registered: {0}")]
    DuplicateCapability(String),

    #[error("Capability call failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Capability rate limited: {tool_name}")]
    RateLimited { tool_name: String },

    #[error("Capability timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Capability not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Failure kinds the control loop catches at a step boundary.
///
/// None of these ever reach the caller of `send_message`; each one is
/// turned into an assistant or tool-evidence turn.
#[derive(Debug, Clone, Error)]
pub enum LoopFailure {
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("model named unknown capability '{0}'")]
    UnknownCapability(String),

    #[error("malformed model response: {0}")]
    MalformedModelResponse(String),

    #[error("invocation limit of {limit} exceeded")]
    InvocationLimitExceeded { limit: u32 },
}

impl LoopFailure {
    /// Short machine-readable name, used in logs and domain events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransportFailure(_) => "transport_failure",
            Self::UnknownCapability(_) => "unknown_capability",
            Self::MalformedModelResponse(_) => "malformed_model_response",
            Self::InvocationLimitExceeded { .. } => "invocation_limit_exceeded",
        }
    }
}

impl From<ProviderError> for LoopFailure {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MalformedResponse(detail) => Self::MalformedModelResponse(detail),
            other => Self::TransportFailure(other.to_string()),
        }
    }
}

impl From<ToolError> for LoopFailure {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::UnknownCapability(id) => Self::UnknownCapability(id),
            other => Self::TransportFailure(other.to_string()),
        }
    }
}
