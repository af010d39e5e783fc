//! Common error types for the CRM services

use thiserror::Error;

/// Common result type for CRM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the CRM crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    ///
    /// Built through `From<sqlx::Error>`, which reports lock contention as
    /// [`Error::Conflict`] instead.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Concurrent modification detected while changing a primary flag
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    /// A database that stayed busy or locked past the busy timeout means a
    /// concurrent writer won; that is a [`Error::Conflict`] the caller may
    /// retry. Everything else stays a [`Error::Database`].
    fn from(err: sqlx::Error) -> Self {
        if is_contended(&err) {
            Error::Conflict(format!("Database is locked by a concurrent writer: {}", err))
        } else {
            Error::Database(err)
        }
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and their extended codes
fn is_contended(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, 5 | 6))
        .unwrap_or(false)
}

impl Error {
    /// Map a store error raised while writing a flag column.
    ///
    /// The partial unique index on every flaggable table turns a second
    /// primary row into a unique violation, reported as [`Error::Conflict`].
    /// Other errors go through `From<sqlx::Error>`.
    pub fn from_flag_write(err: sqlx::Error, table: &str) -> Self {
        let unique = err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);

        if unique {
            Error::Conflict(format!("{} already has a primary row for this group", table))
        } else {
            Error::from(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_error_passes_through() {
        let err = Error::from_flag_write(sqlx::Error::RowNotFound, "contact_emails");
        assert!(matches!(err, Error::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_display_includes_context() {
        let err = Error::Conflict("contact_emails is locked".to_string());
        assert_eq!(err.to_string(), "Conflict: contact_emails is locked");
    }
}
