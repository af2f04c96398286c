//! Errors shared by every [`crate::RecordStore`] implementation.
//!
//! A missing row is never an error: lookups return `Option` and deletes return
//! `bool`. What remains is a rejected write ([`Constraint`]), a store that
//! cannot be reached, or anything else the database reports.

use thiserror::Error;

/// A write the schema does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Constraint {
    #[error("{table}.{column} must be unique")]
    Unique { table: String, column: String },
    #[error("{table}.{column} exceeds {max} characters")]
    MaxLength {
        table: String,
        column: String,
        max: u32,
    },
    #[error("{table}.{column} is required")]
    Required { table: String, column: String },
    #[error("{table}.{column} contains a NUL character")]
    NulCharacter { table: String, column: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[from] Constraint),
    #[error("database unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(String),
}
