//! The module contains the errors the engine can throw.
//!
//! Storage errors are classified when they are converted from [`DbErr`], so a
//! `?` on a sea-orm call already yields the right variant:
//!
//! - [`UniqueViolation`] when an insert/update collides on a unique column.
//! - [`ForeignKeyViolation`] when a reference points to a missing row or a
//!   referenced row is deleted.
//!
//!  [`UniqueViolation`]: EngineError::UniqueViolation
//!  [`ForeignKeyViolation`]: EngineError::ForeignKeyViolation
use std::time::Duration;

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Transaction timed out after {0:?}")]
    TransactionTimeout(Duration),
    #[error(transparent)]
    Database(DbErr),
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                return Self::UniqueViolation(detail);
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                return Self::ForeignKeyViolation(detail);
            }
            _ => {}
        }

        // Some driver paths only surface the SQLite message text.
        let message = err.to_string();
        if message.contains("UNIQUE constraint failed") {
            Self::UniqueViolation(message)
        } else if message.contains("FOREIGN KEY constraint failed") {
            Self::ForeignKeyViolation(message)
        } else {
            Self::Database(err)
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::UniqueViolation(a), Self::UniqueViolation(b)) => a == b,
            (Self::ForeignKeyViolation(a), Self::ForeignKeyViolation(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidQuantity(a), Self::InvalidQuantity(b)) => a == b,
            (Self::TransactionTimeout(a), Self::TransactionTimeout(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclassified_errors_stay_database_errors() {
        let err = EngineError::from(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, EngineError::Database(_)));
    }

    #[test]
    fn sqlite_message_fallback_classifies_constraints() {
        let unique = EngineError::from(DbErr::Custom(
            "UNIQUE constraint failed: materials.sku".to_string(),
        ));
        assert!(matches!(unique, EngineError::UniqueViolation(_)));

        let fk = EngineError::from(DbErr::Custom(
            "FOREIGN KEY constraint failed".to_string(),
        ));
        assert!(matches!(fk, EngineError::ForeignKeyViolation(_)));
    }
}
