//! Email accounts owned by users
//!
//! Each user has at most one default sending account. The group key is
//! always the authenticated user's id.

use super::primary::{self, EMAIL_ACCOUNTS};
use super::{optional_text, require_parent, uuid_column, validate_email};
use crate::db::models::EmailAccount;
use crate::{Error, Result};
use chrono::Utc;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmailAccount {
    pub email: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAccountPatch {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_default: Option<bool>,
}

const SELECT: &str =
    "SELECT guid, user_id, email, display_name, is_default, created_at FROM email_accounts";

fn from_row(row: &SqliteRow) -> Result<EmailAccount> {
    Ok(EmailAccount {
        id: uuid_column(row, "guid")?,
        user_id: uuid_column(row, "user_id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        is_default: row.try_get("is_default")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn create(pool: &SqlitePool, user_id: Uuid, input: &NewEmailAccount) -> Result<EmailAccount> {
    let email = validate_email(&input.email)?;

    let mut tx = pool.begin().await?;
    require_parent(&mut *tx, "users", user_id).await?;

    let is_default = primary::prepare_insert(&mut *tx, &EMAIL_ACCOUNTS, user_id, input.is_default).await?;

    let account = EmailAccount {
        id: Uuid::new_v4(),
        user_id,
        email,
        display_name: optional_text(input.display_name.as_deref()),
        is_default,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO email_accounts (guid, user_id, email, display_name, is_default, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(account.id.to_string())
    .bind(account.user_id.to_string())
    .bind(&account.email)
    .bind(&account.display_name)
    .bind(account.is_default)
    .bind(account.created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| Error::from_flag_write(e, EMAIL_ACCOUNTS.table))?;

    tx.commit().await?;

    info!(user_id = %user_id, account_id = %account.id, is_default = account.is_default, "Added email account");
    Ok(account)
}

/// A user's accounts, default first
pub async fn list(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<EmailAccount>> {
    let rows = sqlx::query(&format!(
        "{} WHERE user_id = ? ORDER BY is_default DESC, rowid",
        SELECT
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Fetch an account only if it belongs to `user_id`
pub async fn get_owned(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<Option<EmailAccount>> {
    let row = sqlx::query(&format!("{} WHERE guid = ? AND user_id = ?", SELECT))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<EmailAccount>> {
    let row = sqlx::query(&format!("{} WHERE guid = ?", SELECT))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn update(
    pool: &SqlitePool,
    user_id: Uuid,
    id: Uuid,
    patch: &EmailAccountPatch,
) -> Result<Option<EmailAccount>> {
    let email = patch.email.as_deref().map(validate_email).transpose()?;

    let mut tx = pool.begin().await?;
    if primary::locate(&mut *tx, &EMAIL_ACCOUNTS, user_id, id).await?.is_none() {
        return Ok(None);
    }

    sqlx::query(
        "UPDATE email_accounts SET email = COALESCE(?, email), \
         display_name = CASE WHEN ? THEN ? ELSE display_name END WHERE guid = ?",
    )
    .bind(email)
    .bind(patch.display_name.is_some())
    .bind(optional_text(patch.display_name.as_deref()))
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    primary::apply_flag(&mut *tx, &EMAIL_ACCOUNTS, user_id, id, patch.is_default).await?;

    let account = fetch(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(account)
}

pub async fn set_default(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<bool> {
    primary::set_primary(pool, &EMAIL_ACCOUNTS, user_id, id).await
}

/// Delete an account; its signatures go with it
pub async fn delete(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<bool> {
    primary::delete(pool, &EMAIL_ACCOUNTS, user_id, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;
    use crate::db::users;

    fn account(email: &str, is_default: bool) -> NewEmailAccount {
        NewEmailAccount {
            email: email.into(),
            display_name: Some("Sales".into()),
            is_default,
        }
    }

    #[tokio::test]
    async fn test_default_account_per_user() {
        let pool = init_memory_database().await.unwrap();
        let ada = users::create_user(&pool, "ada", "analytical", false).await.unwrap();
        let bob = users::create_user(&pool, "bob", "engineer", false).await.unwrap();

        let a1 = create(&pool, ada.id, &account("a1@example.com", false)).await.unwrap();
        let a2 = create(&pool, ada.id, &account("a2@example.com", true)).await.unwrap();
        let b1 = create(&pool, bob.id, &account("b1@example.com", false)).await.unwrap();

        assert!(a2.is_default);
        assert!(b1.is_default);
        assert!(!get_owned(&pool, ada.id, a1.id).await.unwrap().unwrap().is_default);

        // Bob cannot touch Ada's account
        assert!(get_owned(&pool, bob.id, a1.id).await.unwrap().is_none());
        assert!(matches!(
            set_default(&pool, bob.id, a1.id).await,
            Err(Error::InvalidInput(_))
        ));

        assert!(set_default(&pool, ada.id, a1.id).await.unwrap());
        let listed = list(&pool, ada.id).await.unwrap();
        assert_eq!(listed[0].id, a1.id);
        assert!(listed[0].is_default);
        assert!(!listed[1].is_default);
    }

    #[tokio::test]
    async fn test_delete_default_promotes_next() {
        let pool = init_memory_database().await.unwrap();
        let ada = users::create_user(&pool, "ada", "analytical", false).await.unwrap();
        let a1 = create(&pool, ada.id, &account("a1@example.com", false)).await.unwrap();
        let a2 = create(&pool, ada.id, &account("a2@example.com", false)).await.unwrap();

        assert!(delete(&pool, ada.id, a1.id).await.unwrap());
        assert!(get_owned(&pool, ada.id, a2.id).await.unwrap().unwrap().is_default);
    }
}
