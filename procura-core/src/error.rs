//! Error types for PROCURA operations

use crate::EntityType;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type:?} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: Uuid,
        reason: String,
    },

    /// Optimistic precondition failed: the stored status moved underneath us.
    #[error("Conflict on {entity_type:?} {id}: expected one of [{expected}], found {actual}")]
    Conflict {
        entity_type: EntityType,
        id: Uuid,
        expected: String,
        actual: String,
    },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Validation errors, raised before any state change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{entity_type:?} {id} does not belong to {owner_type:?} {owner_id}")]
    ForeignReference {
        entity_type: EntityType,
        id: Uuid,
        owner_type: EntityType,
        owner_id: Uuid,
    },
}

/// A requested status change is not allowed from the current state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{entity_type:?} {id} cannot move from {from} to {to}")]
    InvalidTransition {
        entity_type: EntityType,
        id: Uuid,
        from: String,
        to: String,
    },

    #[error("{entity_type:?} {id} is in terminal status {status}")]
    Terminal {
        entity_type: EntityType,
        id: Uuid,
        status: String,
    },
}

/// Errors from the external parsing / generation service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParserError {
    #[error("No parsing service configured")]
    NotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Request to {provider} timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("{provider} reported an unsuccessful result: {reason}")]
    Unsuccessful { provider: String, reason: String },

    #[error("Transport error talking to {provider}: {reason}")]
    Transport { provider: String, reason: String },
}

impl ParserError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ParserError::Timeout { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all PROCURA errors.
#[derive(Debug, Clone, Error)]
pub enum ProcuraError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ProcuraError {
    /// Shorthand for a not-found storage error.
    pub fn not_found(entity_type: EntityType, id: impl Into<Uuid>) -> Self {
        ProcuraError::Storage(StorageError::NotFound {
            entity_type,
            id: id.into(),
        })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcuraError::Storage(StorageError::NotFound { .. }))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ProcuraError::Storage(StorageError::Conflict { .. }))
    }
}

/// Result type alias for PROCURA operations.
pub type ProcuraResult<T> = Result<T, ProcuraError>;

// =============================================================================
// TESTS
// =============================================================================
