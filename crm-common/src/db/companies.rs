//! Companies

use super::primary::{self, AREAS_OF_ACTIVITY, SYNERGIES};
use super::{optional_text, row_exists, required_text, uuid_column};
use crate::db::models::Company;
use crate::Result;
use chrono::Utc;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompany {
    pub name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyPatch {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

const SELECT: &str =
    "SELECT guid, name, industry, website, notes, created_at, updated_at FROM companies";

fn from_row(row: &SqliteRow) -> Result<Company> {
    Ok(Company {
        id: uuid_column(row, "guid")?,
        name: row.try_get("name")?,
        industry: row.try_get("industry")?,
        website: row.try_get("website")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn create(pool: &SqlitePool, input: &NewCompany) -> Result<Company> {
    let now = Utc::now();
    let company = Company {
        id: Uuid::new_v4(),
        name: required_text("name", &input.name)?,
        industry: optional_text(input.industry.as_deref()),
        website: optional_text(input.website.as_deref()),
        notes: optional_text(input.notes.as_deref()),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO companies (guid, name, industry, website, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(company.id.to_string())
    .bind(&company.name)
    .bind(&company.industry)
    .bind(&company.website)
    .bind(&company.notes)
    .bind(company.created_at)
    .bind(company.updated_at)
    .execute(pool)
    .await?;

    info!(company_id = %company.id, "Created company {}", company.name);
    Ok(company)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Company>> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn list(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<Company>> {
    let rows = sqlx::query(&format!("{} ORDER BY name, rowid LIMIT ? OFFSET ?", SELECT))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    rows.iter().map(from_row).collect()
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: &CompanyPatch) -> Result<Option<Company>> {
    let name = patch
        .name
        .as_deref()
        .map(|v| required_text("name", v))
        .transpose()?;

    let result = sqlx::query(
        r#"
        UPDATE companies
        SET name = COALESCE(?, name),
            industry = CASE WHEN ? THEN ? ELSE industry END,
            website = CASE WHEN ? THEN ? ELSE website END,
            notes = CASE WHEN ? THEN ? ELSE notes END,
            updated_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(name)
    .bind(patch.industry.is_some())
    .bind(optional_text(patch.industry.as_deref()))
    .bind(patch.website.is_some())
    .bind(optional_text(patch.website.as_deref()))
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

/// Delete a company and detach it from every contact
///
/// Areas of activity at the company are removed and live synergies with it
/// are soft-deleted, each through the primary toggler so a contact that
/// loses its primary row gets a successor. Soft-deleted synergies keep
/// their row with `company_id` set to NULL.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;
    if !row_exists(&mut *tx, "companies", id).await? {
        return Ok(false);
    }

    let areas = dependents(
        &mut *tx,
        "SELECT guid, contact_id FROM areas_of_activity WHERE company_id = ?",
        id,
    )
    .await?;
    for (contact_id, area_id) in &areas {
        primary::remove(&mut *tx, &AREAS_OF_ACTIVITY, *contact_id, *area_id).await?;
    }

    let synergies = dependents(
        &mut *tx,
        "SELECT guid, contact_id FROM synergies WHERE company_id = ? AND deleted_at IS NULL",
        id,
    )
    .await?;
    for (contact_id, synergy_id) in &synergies {
        primary::remove(&mut *tx, &SYNERGIES, *contact_id, *synergy_id).await?;
    }

    sqlx::query("DELETE FROM companies WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        company_id = %id,
        areas = areas.len(),
        synergies = synergies.len(),
        "Deleted company"
    );
    Ok(true)
}

/// `(contact_id, guid)` pairs of child rows pointing at a company
async fn dependents(conn: &mut SqliteConnection, sql: &str, company_id: Uuid) -> Result<Vec<(Uuid, Uuid)>> {
    let rows = sqlx::query(sql)
        .bind(company_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| Ok((uuid_column(row, "contact_id")?, uuid_column(row, "guid")?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::areas_of_activity::{self, NewAreaOfActivity};
    use crate::db::contacts::{self, NewContact};
    use crate::db::init::init_memory_database;
    use crate::db::synergies::{self, NewSynergy};

    #[tokio::test]
    async fn test_company_crud() {
        let pool = init_memory_database().await.unwrap();
        let created = create(
            &pool,
            &NewCompany {
                name: "Initech".into(),
                industry: Some("Software".into()),
                website: None,
                notes: None,
            },
        )
        .await
        .unwrap();

        let fetched = get(&pool, created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Initech");
        assert_eq!(fetched.industry.as_deref(), Some("Software"));

        let patch = CompanyPatch {
            website: Some("https://initech.example".into()),
            ..Default::default()
        };
        let updated = update(&pool, created.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.website.as_deref(), Some("https://initech.example"));
        assert_eq!(count(&pool).await.unwrap(), 1);

        assert!(delete(&pool, created.id).await.unwrap());
        assert!(!delete(&pool, created.id).await.unwrap());
    }

    async fn contact_with_two_companies(pool: &SqlitePool) -> (Uuid, Uuid, Uuid) {
        let contact = contacts::create(
            pool,
            &NewContact {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                phone: None,
                notes: None,
                email: None,
            },
        )
        .await
        .unwrap();
        let mut ids = Vec::new();
        for name in ["Analytical Engines", "Difference Engines"] {
            let company = create(
                pool,
                &NewCompany {
                    name: name.into(),
                    industry: None,
                    website: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
            ids.push(company.id);
        }
        (contact.id, ids[0], ids[1])
    }

    #[tokio::test]
    async fn test_delete_promotes_remaining_area() {
        let pool = init_memory_database().await.unwrap();
        let (contact, doomed, kept) = contact_with_two_companies(&pool).await;

        let area = |company_id| NewAreaOfActivity {
            company_id,
            role: None,
            job_description: None,
            is_primary: false,
        };
        let first = areas_of_activity::create(&pool, contact, &area(doomed)).await.unwrap();
        let second = areas_of_activity::create(&pool, contact, &area(kept)).await.unwrap();
        assert!(first.is_primary);

        assert!(delete(&pool, doomed).await.unwrap());

        let remaining = areas_of_activity::list(&pool, contact).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, second.id);
        assert!(remaining[0].is_primary);
    }

    #[tokio::test]
    async fn test_delete_soft_deletes_synergies_and_promotes() {
        let pool = init_memory_database().await.unwrap();
        let (contact, doomed, kept) = contact_with_two_companies(&pool).await;

        let synergy = |company_id| NewSynergy {
            company_id,
            deal_id: None,
            description: None,
            is_primary: false,
        };
        let first = synergies::create(&pool, contact, &synergy(doomed)).await.unwrap();
        let second = synergies::create(&pool, contact, &synergy(kept)).await.unwrap();
        assert!(first.is_primary);

        assert!(delete(&pool, doomed).await.unwrap());

        let live = synergies::list(&pool, contact).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, second.id);
        assert!(live[0].is_primary);

        // The soft-deleted row survives, detached from the company
        let (company_id, deleted_at, is_primary): (Option<String>, Option<String>, bool) =
            sqlx::query_as("SELECT company_id, deleted_at, is_primary FROM synergies WHERE guid = ?")
                .bind(first.id.to_string())
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(company_id.is_none());
        assert!(deleted_at.is_some());
        assert!(!is_primary);
    }

    #[tokio::test]
    async fn test_delete_missing_company_touches_nothing() {
        let pool = init_memory_database().await.unwrap();
        assert!(!delete(&pool, Uuid::new_v4()).await.unwrap());
    }
}
