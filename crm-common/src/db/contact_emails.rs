//! Contact email addresses
//!
//! One email per contact is primary; see [`super::primary`].

use super::primary::{self, CONTACT_EMAILS};
use super::{optional_text, require_parent, uuid_column, validate_email};
use crate::db::models::ContactEmail;
use crate::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContactEmail {
    pub email: String,
    pub label: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEmailPatch {
    pub email: Option<String>,
    pub label: Option<String>,
    pub is_primary: Option<bool>,
}

const SELECT: &str =
    "SELECT guid, contact_id, email, label, is_primary, created_at FROM contact_emails";

fn from_row(row: &SqliteRow) -> Result<ContactEmail> {
    Ok(ContactEmail {
        id: uuid_column(row, "guid")?,
        contact_id: uuid_column(row, "contact_id")?,
        email: row.try_get("email")?,
        label: row.try_get("label")?,
        is_primary: row.try_get("is_primary")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Insert on an open transaction, applying the default-first rule
pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    contact_id: Uuid,
    input: &NewContactEmail,
) -> Result<ContactEmail> {
    let email = validate_email(&input.email)?;
    require_parent(conn, "contacts", contact_id).await?;

    let is_primary = primary::prepare_insert(conn, &CONTACT_EMAILS, contact_id, input.is_primary).await?;

    let record = ContactEmail {
        id: Uuid::new_v4(),
        contact_id,
        email,
        label: optional_text(input.label.as_deref()),
        is_primary,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO contact_emails (guid, contact_id, email, label, is_primary, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.contact_id.to_string())
    .bind(&record.email)
    .bind(&record.label)
    .bind(record.is_primary)
    .bind(record.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::from_flag_write(e, CONTACT_EMAILS.table))?;

    Ok(record)
}

pub async fn create(pool: &SqlitePool, contact_id: Uuid, input: &NewContactEmail) -> Result<ContactEmail> {
    let mut tx = pool.begin().await?;
    let record = insert(&mut *tx, contact_id, input).await?;
    tx.commit().await?;

    info!(
        contact_id = %contact_id,
        email_id = %record.id,
        is_primary = record.is_primary,
        "Added contact email"
    );
    Ok(record)
}

/// All emails of a contact, primary first
pub async fn list(pool: &SqlitePool, contact_id: Uuid) -> Result<Vec<ContactEmail>> {
    let rows = sqlx::query(&format!(
        "{} WHERE contact_id = ? ORDER BY is_primary DESC, rowid",
        SELECT
    ))
    .bind(contact_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<ContactEmail>> {
    let mut conn = pool.acquire().await?;
    fetch(&mut *conn, id).await
}

async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<ContactEmail>> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Update fields and optionally the primary flag in one transaction
///
/// Returns `None` when the email does not exist.
pub async fn update(
    pool: &SqlitePool,
    contact_id: Uuid,
    id: Uuid,
    patch: &ContactEmailPatch,
) -> Result<Option<ContactEmail>> {
    let email = patch.email.as_deref().map(validate_email).transpose()?;

    let mut tx = pool.begin().await?;
    if primary::locate(&mut *tx, &CONTACT_EMAILS, contact_id, id).await?.is_none() {
        return Ok(None);
    }

    sqlx::query(
        "UPDATE contact_emails SET email = COALESCE(?, email), \
         label = CASE WHEN ? THEN ? ELSE label END WHERE guid = ?",
    )
    .bind(email)
    .bind(patch.label.is_some())
    .bind(optional_text(patch.label.as_deref()))
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    primary::apply_flag(&mut *tx, &CONTACT_EMAILS, contact_id, id, patch.is_primary).await?;

    let record = fetch(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(record)
}

pub async fn set_primary(pool: &SqlitePool, contact_id: Uuid, id: Uuid) -> Result<bool> {
    primary::set_primary(pool, &CONTACT_EMAILS, contact_id, id).await
}

pub async fn delete(pool: &SqlitePool, contact_id: Uuid, id: Uuid) -> Result<bool> {
    let removed = primary::delete(pool, &CONTACT_EMAILS, contact_id, id).await?;
    if removed {
        info!(contact_id = %contact_id, email_id = %id, "Removed contact email");
    }
    Ok(removed)
}
