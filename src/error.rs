//! Error types for Lead Intake.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the intake service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("CRM error: {0}")]
    Crm(#[from] CrmError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
///
/// These are fatal: a catalog or policy that fails to load stops the process
/// at startup instead of surfacing mid-conversation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Step catalog is empty")]
    EmptyCatalog,

    #[error("Duplicate step id in catalog: {0}")]
    DuplicateStep(String),

    #[error("Step {0} has an empty prompt")]
    EmptyPrompt(String),

    #[error("Unknown step id: {0}")]
    UnknownStep(String),

    #[error("Unknown lead field: {0}")]
    UnknownField(String),
}

/// Errors returned by a CRM collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("CRM {crm} request failed: {reason}")]
    RequestFailed { crm: String, reason: String },

    #[error("CRM {crm} rejected the contact ({status}): {message}")]
    Rejected {
        crm: String,
        status: u16,
        message: String,
    },

    #[error("CRM {crm} timed out after {timeout:?}")]
    Timeout { crm: String, timeout: Duration },

    #[error("Missing required contact fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    #[error("Invalid response from {crm}: {reason}")]
    InvalidResponse { crm: String, reason: String },
}

/// Session lookup and input errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {0} not found")]
    NotFound(Uuid),

    #[error("Empty input")]
    EmptyInput,

    #[error("Conversation state is corrupt: {0}")]
    Corrupt(#[from] ConfigError),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Result type alias for the intake service.
pub type Result<T> = std::result::Result<T, Error>;
