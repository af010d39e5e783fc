//! Database bootstrap, models and typed repositories
//!
//! Every repository speaks SQL through `sqlx` with explicit column lists.
//! UUID keys are stored as TEXT and parsed on the way out.
//!
//! Patches leave absent fields alone. An optional text field sent blank is
//! cleared to NULL.

pub mod init;
pub mod models;
pub mod primary;

pub mod areas_of_activity;
pub mod companies;
pub mod contact_emails;
pub mod contacts;
pub mod deals;
pub mod email_accounts;
pub mod signatures;
pub mod synergies;
pub mod users;

pub use init::*;
pub use models::*;

use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Read a TEXT column holding a UUID
pub(crate) fn uuid_column(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    parse_uuid(column, &raw)
}

/// Read a nullable TEXT column holding a UUID
pub(crate) fn opt_uuid_column(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| parse_uuid(column, &value)).transpose()
}

fn parse_uuid(column: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| Error::Internal(format!("Invalid UUID in column {}: {} ({})", column, raw, e)))
}

/// Check that a row with the given guid exists
///
/// `table` is always a compile-time table name, never user input.
pub(crate) async fn row_exists(conn: &mut SqliteConnection, table: &str, id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE guid = ?)",
        table
    ))
    .bind(id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Fail with [`Error::NotFound`] unless the parent row exists
pub(crate) async fn require_parent(
    conn: &mut SqliteConnection,
    table: &str,
    id: Uuid,
) -> Result<()> {
    if row_exists(conn, table, id).await? {
        Ok(())
    } else {
        Err(Error::NotFound(format!("{} {}", table, id)))
    }
}

/// Trim a required text field, rejecting blanks
pub(crate) fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field, mapping blanks to `None`
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Minimal shape check for an email address
pub(crate) fn validate_email(value: &str) -> Result<String> {
    let email = required_text("email", value)?;
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') =>
        {
            Ok(email.to_lowercase())
        }
        _ => Err(Error::InvalidInput(format!("Invalid email address: {}", email))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("  Ada@Example.com ").unwrap(), "ada@example.com");
        assert!(validate_email("ada").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@localhost").is_err());
        assert!(validate_email("ada@example.").is_err());
        assert!(validate_email("   ").is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  x ")), Some("x".to_string()));
        assert_eq!(optional_text(Some("   ")), None);
        assert_eq!(optional_text(None), None);
    }
}
