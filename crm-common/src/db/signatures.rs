//! Email signatures
//!
//! Signatures hang off an email account; one per account is the default.
//! Callers must check that the account belongs to the acting user before
//! reaching these functions.

use super::primary::{self, SIGNATURES};
use super::{require_parent, required_text, uuid_column};
use crate::db::models::Signature;
use crate::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSignature {
    pub name: String,
    pub body: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePatch {
    pub name: Option<String>,
    pub body: Option<String>,
    pub is_default: Option<bool>,
}

const SELECT: &str = "SELECT guid, account_id, name, body, is_default, created_at FROM signatures";

fn from_row(row: &SqliteRow) -> Result<Signature> {
    Ok(Signature {
        id: uuid_column(row, "guid")?,
        account_id: uuid_column(row, "account_id")?,
        name: row.try_get("name")?,
        body: row.try_get("body")?,
        is_default: row.try_get("is_default")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn create(pool: &SqlitePool, account_id: Uuid, input: &NewSignature) -> Result<Signature> {
    let name = required_text("name", &input.name)?;

    let mut tx = pool.begin().await?;
    require_parent(&mut *tx, "email_accounts", account_id).await?;

    let is_default = primary::prepare_insert(&mut *tx, &SIGNATURES, account_id, input.is_default).await?;

    let signature = Signature {
        id: Uuid::new_v4(),
        account_id,
        name,
        // Bodies are stored verbatim; leading/trailing whitespace is layout
        body: input.body.clone(),
        is_default,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO signatures (guid, account_id, name, body, is_default, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(signature.id.to_string())
    .bind(signature.account_id.to_string())
    .bind(&signature.name)
    .bind(&signature.body)
    .bind(signature.is_default)
    .bind(signature.created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::from_flag_write(e, SIGNATURES.table))?;

    tx.commit().await?;
    Ok(signature)
}

/// Signatures of an account, default first
pub async fn list(pool: &SqlitePool, account_id: Uuid) -> Result<Vec<Signature>> {
    let rows = sqlx::query(&format!(
        "{} WHERE account_id = ? ORDER BY is_default DESC, rowid",
        SELECT
    ))
    .bind(account_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// The default signature of an account, if it has any signatures
pub async fn get_default(pool: &SqlitePool, account_id: Uuid) -> Result<Option<Signature>> {
    let row = sqlx::query(&format!("{} WHERE account_id = ? AND is_default = 1", SELECT))
        .bind(account_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Signature>> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn update(
    pool: &SqlitePool,
    account_id: Uuid,
    id: Uuid,
    patch: &SignaturePatch,
) -> Result<Option<Signature>> {
    let name = patch
        .name
        .as_deref()
        .map(|v| required_text("name", v))
        .transpose()?;

    let mut tx = pool.begin().await?;
    if primary::locate(&mut *tx, &SIGNATURES, account_id, id).await?.is_none() {
        return Ok(None);
    }

    sqlx::query("UPDATE signatures SET name = COALESCE(?, name), body = COALESCE(?, body) WHERE guid = ?")
        .bind(name)
        .bind(patch.body.as_deref())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    primary::apply_flag(&mut *tx, &SIGNATURES, account_id, id, patch.is_default).await?;

    let signature = fetch(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(signature)
}

pub async fn set_default(pool: &SqlitePool, account_id: Uuid, id: Uuid) -> Result<bool> {
    primary::set_primary(pool, &SIGNATURES, account_id, id).await
}

pub async fn delete(pool: &SqlitePool, account_id: Uuid, id: Uuid) -> Result<bool> {
    primary::delete(pool, &SIGNATURES, account_id, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::email_accounts::{self, NewEmailAccount};
    use crate::db::init::init_memory_database;
    use crate::db::users;

    async fn setup() -> (SqlitePool, Uuid) {
        let pool = init_memory_database().await.unwrap();
        let user = users::create_user(&pool, "ada", "analytical", false).await.unwrap();
        let account = email_accounts::create(
            &pool,
            user.id,
            &NewEmailAccount {
                email: "ada@example.com".into(),
                display_name: None,
                is_default: false,
            },
        )
        .await
        .unwrap();
        (pool, account.id)
    }

    fn signature(name: &str, is_default: bool) -> NewSignature {
        NewSignature {
            name: name.into(),
            body: format!("-- \n{}\n", name),
            is_default,
        }
    }

    #[tokio::test]
    async fn test_default_signature_rules() {
        let (pool, account) = setup().await;
        assert!(get_default(&pool, account).await.unwrap().is_none());

        let formal = create(&pool, account, &signature("Formal", false)).await.unwrap();
        let casual = create(&pool, account, &signature("Casual", false)).await.unwrap();
        assert!(formal.is_default);
        assert_eq!(formal.body, "-- \nFormal\n");

        assert!(set_default(&pool, account, casual.id).await.unwrap());
        assert_eq!(get_default(&pool, account).await.unwrap().unwrap().id, casual.id);

        assert!(delete(&pool, account, casual.id).await.unwrap());
        assert_eq!(get_default(&pool, account).await.unwrap().unwrap().id, formal.id);
    }

    #[tokio::test]
    async fn test_update_signature_body() {
        let (pool, account) = setup().await;
        let formal = create(&pool, account, &signature("Formal", false)).await.unwrap();

        let patch = SignaturePatch {
            body: Some("Regards".into()),
            ..Default::default()
        };
        let updated = update(&pool, account, formal.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.body, "Regards");
        assert_eq!(updated.name, "Formal");
        assert!(updated.is_default);
        assert_eq!(list(&pool, account).await.unwrap().len(), 1);
    }
}
