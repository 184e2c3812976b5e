use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Error taxonomy for the care-plan core. Nothing in here retries: a failed
/// extraction, cipher call, or store write is surfaced to the caller as-is,
/// and retry policy (if any) belongs to the orchestration layer above.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The extraction model's output could not be recovered into the
    /// required checklist/plan shape.
    #[error("extraction output unusable: {reason}")]
    ExtractionFormat { reason: String },

    /// The extraction model endpoint itself failed (transport, timeout,
    /// non-success status, empty candidate).
    #[error("extraction gateway failure: {0}")]
    Gateway(String),

    /// Ownership or identity mismatch: the record doesn't exist, is
    /// soft-deleted, or belongs to someone else.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Persistence failure. Fatal for the current operation.
    #[error("record store failure: {0}")]
    Store(String),

    /// Encryption or decryption failure. Fatal, never swallowed.
    #[error("cipher failure: {0}")]
    Cipher(String),
}

impl CoreError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn extraction(reason: impl Into<String>) -> Self {
        Self::ExtractionFormat {
            reason: reason.into(),
        }
    }
}

/// Structured error response, designed for agents as much as humans.
/// Every error contains enough information for a client to understand
/// what went wrong and how to fix it.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "not_found")
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const EXTRACTION_FAILED: &str = "extraction_failed";
    pub const GATEWAY_UNAVAILABLE: &str = "gateway_unavailable";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
