//! Error taxonomy for the spec loading, resolution, and sync pipeline.
//!
//! Validation, faker, and schema-ref failures are deliberately *not* represented
//! here: per the validation pipeline and synthesizer design, those are absorbed
//! at the point of failure and turned into a response or a value, never
//! propagated as a `Result` error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OuroborosError {
    #[error("spec file not found: {0}")]
    FileMissing(String),

    #[error("spec file malformed: {0}")]
    FileMalformed(String),

    #[error("no success response defined for {method} {path}")]
    ResponseDefinitionMissing { method: String, path: String },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, OuroborosError>;
