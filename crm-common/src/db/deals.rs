//! Deals and the sales pipeline

use super::{opt_uuid_column, require_parent, required_text, uuid_column};
use crate::db::models::{Deal, PipelineStage};
use crate::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeal {
    pub title: String,
    #[serde(default)]
    pub value_cents: i64,
    /// Defaults to the first stage of the pipeline
    pub stage_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealPatch {
    pub title: Option<String>,
    pub value_cents: Option<i64>,
    pub company_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
}

const SELECT: &str = "SELECT guid, title, value_cents, stage_id, company_id, contact_id, created_at, updated_at \
                      FROM deals";

fn from_row(row: &SqliteRow) -> Result<Deal> {
    Ok(Deal {
        id: uuid_column(row, "guid")?,
        title: row.try_get("title")?,
        value_cents: row.try_get("value_cents")?,
        stage_id: uuid_column(row, "stage_id")?,
        company_id: opt_uuid_column(row, "company_id")?,
        contact_id: opt_uuid_column(row, "contact_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn check_value(value_cents: i64) -> Result<()> {
    if value_cents < 0 {
        return Err(Error::InvalidInput(format!(
            "valueCents must not be negative (got {})",
            value_cents
        )));
    }
    Ok(())
}

/// Pipeline stages in board order
pub async fn list_stages(pool: &SqlitePool) -> Result<Vec<PipelineStage>> {
    let rows = sqlx::query("SELECT guid, name, position FROM pipeline_stages ORDER BY position")
        .fetch_all(pool)
        .await?;

    rows.iter().map(stage_from_row).collect()
}

fn stage_from_row(row: &SqliteRow) -> Result<PipelineStage> {
    Ok(PipelineStage {
        id: uuid_column(row, "guid")?,
        name: row.try_get("name")?,
        position: row.try_get("position")?,
    })
}

async fn first_stage(conn: &mut SqliteConnection) -> Result<Uuid> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT guid FROM pipeline_stages ORDER BY position LIMIT 1")
            .fetch_optional(&mut *conn)
            .await?;

    let raw = raw.ok_or_else(|| Error::Internal("Pipeline has no stages".to_string()))?;
    Uuid::parse_str(&raw).map_err(|e| Error::Internal(format!("Invalid stage guid: {}", e)))
}

pub async fn create(pool: &SqlitePool, input: &NewDeal) -> Result<Deal> {
    let title = required_text("title", &input.title)?;
    check_value(input.value_cents)?;

    let mut tx = pool.begin().await?;

    let stage_id = match input.stage_id {
        Some(stage_id) => {
            require_parent(&mut *tx, "pipeline_stages", stage_id).await?;
            stage_id
        }
        None => first_stage(&mut *tx).await?,
    };
    if let Some(company_id) = input.company_id {
        require_parent(&mut *tx, "companies", company_id).await?;
    }
    if let Some(contact_id) = input.contact_id {
        require_parent(&mut *tx, "contacts", contact_id).await?;
    }

    let now = Utc::now();
    let deal = Deal {
        id: Uuid::new_v4(),
        title,
        value_cents: input.value_cents,
        stage_id,
        company_id: input.company_id,
        contact_id: input.contact_id,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO deals (guid, title, value_cents, stage_id, company_id, contact_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(deal.id.to_string())
    .bind(&deal.title)
    .bind(deal.value_cents)
    .bind(deal.stage_id.to_string())
    .bind(deal.company_id.map(|id| id.to_string()))
    .bind(deal.contact_id.map(|id| id.to_string()))
    .bind(deal.created_at)
    .bind(deal.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(deal_id = %deal.id, "Created deal '{}'", deal.title);
    Ok(deal)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Deal>> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn count(pool: &SqlitePool, stage_id: Option<Uuid>) -> Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals WHERE ?1 IS NULL OR stage_id = ?1")
        .bind(stage_id.map(|id| id.to_string()))
        .fetch_one(pool)
        .await?;
    Ok(total)
}

/// One page of deals, newest first, optionally restricted to one stage
pub async fn list(pool: &SqlitePool, stage_id: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<Deal>> {
    let rows = sqlx::query(&format!(
        "{} WHERE ?1 IS NULL OR stage_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
        SELECT
    ))
    .bind(stage_id.map(|id| id.to_string()))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: &DealPatch) -> Result<Option<Deal>> {
    let title = patch
        .title
        .as_deref()
        .map(|v| required_text("title", v))
        .transpose()?;
    if let Some(value_cents) = patch.value_cents {
        check_value(value_cents)?;
    }

    let mut tx = pool.begin().await?;
    if let Some(company_id) = patch.company_id {
        require_parent(&mut *tx, "companies", company_id).await?;
    }
    if let Some(contact_id) = patch.contact_id {
        require_parent(&mut *tx, "contacts", contact_id).await?;
    }

    let result = sqlx::query(
        r#"
        UPDATE deals
        SET title = COALESCE(?, title),
            value_cents = COALESCE(?, value_cents),
            company_id = COALESCE(?, company_id),
            contact_id = COALESCE(?, contact_id),
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(title)
    .bind(patch.value_cents)
    .bind(patch.company_id.map(|id| id.to_string()))
    .bind(patch.contact_id.map(|id| id.to_string()))
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

/// Move a deal to another pipeline stage
pub async fn move_stage(pool: &SqlitePool, id: Uuid, stage_id: Uuid) -> Result<Option<Deal>> {
    let mut tx = pool.begin().await?;
    require_parent(&mut *tx, "pipeline_stages", stage_id).await?;

    let result = sqlx::query("UPDATE deals SET stage_id = ?, updated_at = ? WHERE guid = ?")
        .bind(stage_id.to_string())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    info!(deal_id = %id, stage_id = %stage_id, "Deal moved");
    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM deals WHERE guid = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
