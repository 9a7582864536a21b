//! Error type definitions for the capture receiver.
//!
//! Hierarchical error system: a top-level `AppError` that HTTP handlers map to
//! status codes, with `#[from]` conversions from each layer's own error type.

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed request: empty body, bad channel number, missing required attribute.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Missing session/segment/channel/pipeline run.
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// An operation was rejected because of a conflicting state transition
    /// (e.g. a second `complete` race, or a session already `processing`).
    #[error("Conflict: {operation} on {resource} - {message}")]
    Conflict {
        operation: String,
        resource: String,
        message: String,
    },

    /// Database-related errors (SeaORM).
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Repository layer errors.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Pipeline execution errors.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Local blob or object-store errors.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Generic internal errors.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn conflict<O: Into<String>, R: Into<String>, M: Into<String>>(
        operation: O,
        resource: R,
        message: M,
    ) -> Self {
        Self::Conflict {
            operation: operation.into(),
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Repository layer specific errors: the boundary between domain types and
/// the Metadata Store's row shapes.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM, passed through unchanged.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Unique/foreign-key constraint violations.
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Record not found by primary key or unique key.
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Failure serializing/deserializing a JSON column (`input_snapshot`,
    /// `output_snapshot`, `error_message`).
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Chrono parsing errors at the RFC3339 wire boundary.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Whether a storage failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Network blip, throttling, or other condition expected to clear up.
    Transient,
    /// Bad credentials, missing bucket, or other condition that will not
    /// resolve itself on retry.
    Permanent,
}

/// Local-blob or object-store failures.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Local blob store (`sandboxed-file-manager`) failure.
    #[error("Local blob store error: {0}")]
    Blob(#[from] sandboxed_file_manager::SandboxedFileError),

    /// Object-store (S3-compatible) failure, tagged by retryability.
    #[error("Object store error ({kind:?}): {message}")]
    ObjectStore {
        kind: StorageErrorKind,
        message: String,
    },
}

impl StorageError {
    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self::ObjectStore {
            kind: StorageErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent<S: Into<String>>(message: S) -> Self {
        Self::ObjectStore {
            kind: StorageErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Whether the Upload Queue should count this failure against an item's
    /// retry budget.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ObjectStore { kind, .. } => matches!(kind, StorageErrorKind::Transient),
            Self::Blob(_) => false,
        }
    }
}

/// Pipeline execution errors (§7 "Tool failure" / "Data invariant breach" /
/// "Programming bug").
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Non-zero subprocess exit (or other failure) from the Audio Toolbox.
    #[error("Tool failure in {tool}: {message}")]
    ToolFailure { tool: String, message: String },

    /// A data invariant was violated, e.g. segment indices inconsistent with
    /// the declared channel group.
    #[error("Invariant breach: {message}")]
    InvariantBreach { message: String },

    /// A step failed terminally after exhausting its retries; wraps the
    /// underlying cause plus the step name for provenance.
    #[error("Step '{step_name}' failed: {message}")]
    StepFailure {
        step_name: String,
        message: String,
        #[source]
        source: Option<Box<PipelineError>>,
    },
}

impl PipelineError {
    pub fn tool_failure<T: Into<String>, M: Into<String>>(tool: T, message: M) -> Self {
        Self::ToolFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn invariant_breach<M: Into<String>>(message: M) -> Self {
        Self::InvariantBreach {
            message: message.into(),
        }
    }

    pub fn step_failure<S: Into<String>, M: Into<String>>(
        step_name: S,
        message: M,
        source: Option<PipelineError>,
    ) -> Self {
        Self::StepFailure {
            step_name: step_name.into(),
            message: message.into(),
            source: source.map(Box::new),
        }
    }
}
