//! Centralized error handling for the capture receiver.
//!
//! Unifies error types across the ingest, upload-queue, session-manager, and
//! pipeline layers so HTTP handlers have a single `AppError` to match on.
//!
//! # Usage
//!
//! ```rust
//! use capture_receiver::errors::{AppError, AppResult};
//!
//! async fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for Storage Results
pub type StorageResult<T> = Result<T, StorageError>;

/// Convenience type alias for Pipeline Results
pub type PipelineResult<T> = Result<T, PipelineError>;
