//! Areas of activity: a contact's affiliations with companies
//!
//! One affiliation per contact is primary.

use super::primary::{self, AREAS_OF_ACTIVITY};
use super::{optional_text, require_parent, uuid_column};
use crate::db::models::AreaOfActivity;
use crate::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAreaOfActivity {
    pub company_id: Uuid,
    pub role: Option<String>,
    pub job_description: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaOfActivityPatch {
    pub role: Option<String>,
    pub job_description: Option<String>,
    pub is_primary: Option<bool>,
}

const SELECT: &str = "SELECT guid, contact_id, company_id, role, job_description, is_primary, created_at \
                      FROM areas_of_activity";

fn from_row(row: &SqliteRow) -> Result<AreaOfActivity> {
    Ok(AreaOfActivity {
        id: uuid_column(row, "guid")?,
        contact_id: uuid_column(row, "contact_id")?,
        company_id: uuid_column(row, "company_id")?,
        role: row.try_get("role")?,
        job_description: row.try_get("job_description")?,
        is_primary: row.try_get("is_primary")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn create(
    pool: &SqlitePool,
    contact_id: Uuid,
    input: &NewAreaOfActivity,
) -> Result<AreaOfActivity> {
    let mut tx = pool.begin().await?;
    require_parent(&mut *tx, "contacts", contact_id).await?;
    require_parent(&mut *tx, "companies", input.company_id).await?;

    let is_primary =
        primary::prepare_insert(&mut *tx, &AREAS_OF_ACTIVITY, contact_id, input.is_primary).await?;

    let record = AreaOfActivity {
        id: Uuid::new_v4(),
        contact_id,
        company_id: input.company_id,
        role: optional_text(input.role.as_deref()),
        job_description: optional_text(input.job_description.as_deref()),
        is_primary,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO areas_of_activity (guid, contact_id, company_id, role, job_description, is_primary, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.contact_id.to_string())
    .bind(record.company_id.to_string())
    .bind(&record.role)
    .bind(&record.job_description)
    .bind(record.is_primary)
    .bind(record.created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::from_flag_write(e, AREAS_OF_ACTIVITY.table))?;

    tx.commit().await?;

    info!(
        contact_id = %contact_id,
        company_id = %record.company_id,
        is_primary = record.is_primary,
        "Added area of activity"
    );
    Ok(record)
}

/// All affiliations of a contact, primary first
pub async fn list(pool: &SqlitePool, contact_id: Uuid) -> Result<Vec<AreaOfActivity>> {
    let rows = sqlx::query(&format!(
        "{} WHERE contact_id = ? ORDER BY is_primary DESC, rowid",
        SELECT
    ))
    .bind(contact_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<AreaOfActivity>> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn update(
    pool: &SqlitePool,
    contact_id: Uuid,
    id: Uuid,
    patch: &AreaOfActivityPatch,
) -> Result<Option<AreaOfActivity>> {
    let mut tx = pool.begin().await?;
    if primary::locate(&mut *tx, &AREAS_OF_ACTIVITY, contact_id, id).await?.is_none() {
        return Ok(None);
    }

    sqlx::query(
        "UPDATE areas_of_activity SET role = CASE WHEN ? THEN ? ELSE role END, \
         job_description = CASE WHEN ? THEN ? ELSE job_description END WHERE guid = ?",
    )
    .bind(patch.role.is_some())
    .bind(optional_text(patch.role.as_deref()))
    .bind(patch.job_description.is_some())
    .bind(optional_text(patch.job_description.as_deref()))
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    primary::apply_flag(&mut *tx, &AREAS_OF_ACTIVITY, contact_id, id, patch.is_primary).await?;

    let record = fetch(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(record)
}

pub async fn set_primary(pool: &SqlitePool, contact_id: Uuid, id: Uuid) -> Result<bool> {
    primary::set_primary(pool, &AREAS_OF_ACTIVITY, contact_id, id).await
}

pub async fn delete(pool: &SqlitePool, contact_id: Uuid, id: Uuid) -> Result<bool> {
    primary::delete(pool, &AREAS_OF_ACTIVITY, contact_id, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::companies::{self, NewCompany};
    use crate::db::contacts::{self, NewContact};
    use crate::db::init::init_memory_database;

    async fn setup() -> (SqlitePool, Uuid, Uuid, Uuid) {
        let pool = init_memory_database().await.unwrap();
        let contact = contacts::create(
            &pool,
            &NewContact {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                phone: None,
                notes: None,
                email: None,
            },
        )
        .await
        .unwrap();

        let mut companies = Vec::new();
        for name in ["Navy", "Remington Rand"] {
            let company = companies::create(
                &pool,
                &NewCompany {
                    name: name.into(),
                    industry: None,
                    website: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
            companies.push(company.id);
        }

        (pool, contact.id, companies[0], companies[1])
    }

    fn affiliation(company_id: Uuid, is_primary: bool) -> NewAreaOfActivity {
        NewAreaOfActivity {
            company_id,
            role: Some("Engineer".into()),
            job_description: None,
            is_primary,
        }
    }

    #[tokio::test]
    async fn test_primary_affiliation_lifecycle() {
        let (pool, contact, navy, remington) = setup().await;

        let first = create(&pool, contact, &affiliation(navy, false)).await.unwrap();
        let second = create(&pool, contact, &affiliation(remington, false)).await.unwrap();
        assert!(first.is_primary);
        assert!(!second.is_primary);

        assert!(set_primary(&pool, contact, second.id).await.unwrap());
        let listed = list(&pool, contact).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert!(!listed[1].is_primary);

        assert!(delete(&pool, contact, second.id).await.unwrap());
        let listed = list(&pool, contact).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_primary);
    }

    #[tokio::test]
    async fn test_unknown_company_is_not_found() {
        let (pool, contact, _, _) = setup().await;
        let result = create(&pool, contact, &affiliation(Uuid::new_v4(), false)).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_role_and_flag() {
        let (pool, contact, navy, remington) = setup().await;
        create(&pool, contact, &affiliation(navy, false)).await.unwrap();
        let second = create(&pool, contact, &affiliation(remington, false)).await.unwrap();

        let patch = AreaOfActivityPatch {
            role: Some("Rear Admiral".into()),
            job_description: None,
            is_primary: Some(true),
        };
        let updated = update(&pool, contact, second.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.role.as_deref(), Some("Rear Admiral"));
        assert!(updated.is_primary);

        let primaries = list(&pool, contact)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_primary)
            .count();
        assert_eq!(primaries, 1);
    }
}
