//! # Store Error Types Module
//!
//! Typed failures of the repository layer. Handlers branch on these where the
//! failure kind changes the conversation (a duplicate promocode sends the
//! operator back to the code step); everything else is bubbled up as
//! `anyhow::Error` with context.

use thiserror::Error;

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column already holds this value
    #[error("Duplicate value for {field}: {value}")]
    Duplicate { field: &'static str, value: String },
    /// The referenced row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    /// Any other database failure
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map a unique-constraint violation onto `Duplicate`, keep anything else as is
    pub fn from_insert(err: sqlx::Error, field: &'static str, value: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Duplicate {
                field,
                value: value.to_string(),
            },
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let dup = StoreError::Duplicate {
            field: "code",
            value: "SALE10".to_string(),
        };
        assert_eq!(dup.to_string(), "Duplicate value for code: SALE10");

        let missing = StoreError::NotFound { entity: "order", id: 7 };
        assert_eq!(missing.to_string(), "order 7 not found");
    }

    #[test]
    fn test_from_insert_keeps_other_errors() {
        let err = StoreError::from_insert(sqlx::Error::RowNotFound, "code", "X");
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }
}
