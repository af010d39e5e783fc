//! Contacts
//!
//! A contact is the parent of contact emails, areas of activity and
//! synergies. Deleting a contact cascades to all three.

use super::contact_emails::{self, NewContactEmail};
use super::{optional_text, required_text, uuid_column};
use crate::db::models::Contact;
use crate::Result;
use chrono::Utc;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    /// Optional first email address, stored as the primary one
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

const SELECT: &str = r#"
    SELECT c.guid, c.first_name, c.last_name, c.phone, c.notes, c.created_at, c.updated_at,
           (SELECT e.email FROM contact_emails e
             WHERE e.contact_id = c.guid AND e.is_primary = 1) AS primary_email
    FROM contacts c
"#;

fn from_row(row: &SqliteRow) -> Result<Contact> {
    Ok(Contact {
        id: uuid_column(row, "guid")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
        notes: row.try_get("notes")?,
        primary_email: row.try_get("primary_email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Create a contact, with its first email when one is given
pub async fn create(pool: &SqlitePool, input: &NewContact) -> Result<Contact> {
    let first_name = required_text("firstName", &input.first_name)?;
    let last_name = required_text("lastName", &input.last_name)?;
    let id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO contacts (guid, first_name, last_name, phone, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&first_name)
    .bind(&last_name)
    .bind(optional_text(input.phone.as_deref()))
    .bind(optional_text(input.notes.as_deref()))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if let Some(email) = optional_text(input.email.as_deref()) {
        let first = NewContactEmail {
            email,
            label: None,
            is_primary: true,
        };
        contact_emails::insert(&mut *tx, id, &first).await?;
    }

    let contact = fetch(&mut *tx, id).await?.ok_or_else(|| {
        crate::Error::Internal(format!("Contact {} vanished during creation", id))
    })?;
    tx.commit().await?;

    info!(contact_id = %id, "Created contact {} {}", first_name, last_name);
    Ok(contact)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Contact>> {
    let mut conn = pool.acquire().await?;
    fetch(&mut *conn, id).await
}

async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Contact>> {
    let row = sqlx::query(&format!("{} WHERE c.guid = ?", SELECT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
        .fetch_one(pool)
        .await?;
    Ok(total)
}

/// One page of contacts ordered by name
pub async fn list(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<Contact>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY c.last_name, c.first_name, c.rowid LIMIT ? OFFSET ?",
        SELECT
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: &ContactPatch) -> Result<Option<Contact>> {
    let first_name = patch
        .first_name
        .as_deref()
        .map(|v| required_text("firstName", v))
        .transpose()?;
    let last_name = patch
        .last_name
        .as_deref()
        .map(|v| required_text("lastName", v))
        .transpose()?;

    let result = sqlx::query(
        r#"
        UPDATE contacts
        SET first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            phone = CASE WHEN ? THEN ? ELSE phone END,
            notes = CASE WHEN ? THEN ? ELSE notes END,
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(first_name)
    .bind(last_name)
    .bind(patch.phone.is_some())
    .bind(optional_text(patch.phone.as_deref()))
    .bind(patch.notes.is_some())
    .bind(optional_text(patch.notes.as_deref()))
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM contacts WHERE guid = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        info!(contact_id = %id, "Deleted contact");
    }
    Ok(deleted)
}
