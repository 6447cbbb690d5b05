//! # Engine Error Types
//!
//! One error type over both failure families:
//!
//! ```text
//! EngineError::Domain(CoreError)  - business rule violations; the caller
//!                                   did something the rules forbid
//! EngineError::Store(DbError)     - infrastructure faults; the database
//!                                   itself misbehaved
//! ```
//!
//! The split matters to callers: `Domain` errors are user-presentable and
//! fixable by changing the request; `Store` errors are operational.

use thiserror::Error;

use tally_core::CoreError;
use tally_db::DbError;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the operation. No writes happened.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// The database layer failed. The enclosing transaction rolled back.
    #[error(transparent)]
    Store(#[from] DbError),
}

impl From<tally_core::ValidationError> for EngineError {
    fn from(err: tally_core::ValidationError) -> Self {
        EngineError::Domain(CoreError::Validation(err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
