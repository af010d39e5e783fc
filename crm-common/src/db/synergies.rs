//! Synergies between a contact and a company
//!
//! Synergies are soft-deleted: `deleted_at` is stamped and the row stays in
//! the table for history. Only live rows take part in the primary rule and
//! only live rows are returned from here.

use super::primary::{self, SYNERGIES};
use super::{opt_uuid_column, optional_text, require_parent, uuid_column};
use crate::db::models::Synergy;
use crate::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSynergy {
    pub company_id: Uuid,
    pub deal_id: Option<Uuid>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynergyPatch {
    pub deal_id: Option<Uuid>,
    pub description: Option<String>,
    pub is_primary: Option<bool>,
}

const SELECT: &str = "SELECT guid, contact_id, company_id, deal_id, description, is_primary, created_at \
                      FROM synergies";

fn from_row(row: &SqliteRow) -> Result<Synergy> {
    Ok(Synergy {
        id: uuid_column(row, "guid")?,
        contact_id: uuid_column(row, "contact_id")?,
        company_id: uuid_column(row, "company_id")?,
        deal_id: opt_uuid_column(row, "deal_id")?,
        description: row.try_get("description")?,
        is_primary: row.try_get("is_primary")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn create(pool: &SqlitePool, contact_id: Uuid, input: &NewSynergy) -> Result<Synergy> {
    let mut tx = pool.begin().await?;
    require_parent(&mut *tx, "contacts", contact_id).await?;
    require_parent(&mut *tx, "companies", input.company_id).await?;
    if let Some(deal_id) = input.deal_id {
        require_parent(&mut *tx, "deals", deal_id).await?;
    }

    let is_primary = primary::prepare_insert(&mut *tx, &SYNERGIES, contact_id, input.is_primary).await?;

    let synergy = Synergy {
        id: Uuid::new_v4(),
        contact_id,
        company_id: input.company_id,
        deal_id: input.deal_id,
        description: optional_text(input.description.as_deref()),
        is_primary,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO synergies (guid, contact_id, company_id, deal_id, description, is_primary, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(synergy.id.to_string())
    .bind(synergy.contact_id.to_string())
    .bind(synergy.company_id.to_string())
    .bind(synergy.deal_id.map(|id| id.to_string()))
    .bind(&synergy.description)
    .bind(synergy.is_primary)
    .bind(synergy.created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::from_flag_write(e, SYNERGIES.table))?;

    tx.commit().await?;

    info!(contact_id = %contact_id, synergy_id = %synergy.id, "Recorded synergy");
    Ok(synergy)
}

/// Live synergies of a contact, primary first
pub async fn list(pool: &SqlitePool, contact_id: Uuid) -> Result<Vec<Synergy>> {
    let rows = sqlx::query(&format!(
        "{} WHERE contact_id = ? AND deleted_at IS NULL ORDER BY is_primary DESC, rowid",
        SELECT
    ))
    .bind(contact_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Synergy>> {
    let mut conn = pool.acquire().await?;
    fetch(&mut *conn, id).await
}

async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Synergy>> {
    let row = sqlx::query(&format!("{} WHERE guid = ? AND deleted_at IS NULL", SELECT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn update(
    pool: &SqlitePool,
    contact_id: Uuid,
    id: Uuid,
    patch: &SynergyPatch,
) -> Result<Option<Synergy>> {
    let mut tx = pool.begin().await?;
    if primary::locate(&mut *tx, &SYNERGIES, contact_id, id).await?.is_none() {
        return Ok(None);
    }
    if let Some(deal_id) = patch.deal_id {
        require_parent(&mut *tx, "deals", deal_id).await?;
    }

    sqlx::query(
        "UPDATE synergies SET deal_id = COALESCE(?, deal_id), \
         description = CASE WHEN ? THEN ? ELSE description END WHERE guid = ?",
    )
    .bind(patch.deal_id.map(|id| id.to_string()))
    .bind(patch.description.is_some())
    .bind(optional_text(patch.description.as_deref()))
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    primary::apply_flag(&mut *tx, &SYNERGIES, contact_id, id, patch.is_primary).await?;

    let synergy = fetch(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(synergy)
}

pub async fn set_primary(pool: &SqlitePool, contact_id: Uuid, id: Uuid) -> Result<bool> {
    primary::set_primary(pool, &SYNERGIES, contact_id, id).await
}

/// Soft-delete a synergy; the oldest live one takes over as primary
pub async fn delete(pool: &SqlitePool, contact_id: Uuid, id: Uuid) -> Result<bool> {
    primary::delete(pool, &SYNERGIES, contact_id, id).await
}
