//! Users and login sessions

use super::{required_text, uuid_column};
use crate::auth::{generate_token, hash_password, token_digest, verify_password};
use crate::db::models::{Session, User};
use crate::{Error, Result};
use chrono::{Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

/// Username of the account created from `admin_password`
pub const ADMIN_USERNAME: &str = "admin";

/// Shortest password accepted for new accounts
pub const MIN_PASSWORD_LEN: usize = 8;

fn from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: uuid_column(row, "guid")?,
        username: row.try_get("username")?,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Run CPU-heavy password work off the async worker threads
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Internal(format!("Password task failed: {}", e)))?
}

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    is_admin: bool,
) -> Result<User> {
    let username = required_text("username", username)?.to_lowercase();
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = run_blocking({
        let password = password.to_string();
        move || hash_password(&password)
    })
    .await?;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username,
        is_admin,
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO users (guid, username, password_hash, is_admin, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.username)
    .bind(&password_hash)
    .bind(user.is_admin)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| {
        let unique = e
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);
        if unique {
            Error::Conflict(format!("Username already taken: {}", user.username))
        } else {
            Error::from(e)
        }
    })?;

    info!(user_id = %user.id, "Created user {}", user.username);
    Ok(user)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query("SELECT guid, username, is_admin, created_at FROM users WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(from_row).transpose()
}

/// Check a username/password pair
///
/// Unknown users and wrong passwords are indistinguishable to the caller.
pub async fn verify_credentials(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT guid, username, is_admin, created_at, password_hash FROM users WHERE username = ?",
    )
    .bind(username.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let hash: String = row.try_get("password_hash")?;
    let matches = run_blocking({
        let password = password.to_string();
        move || verify_password(&password, &hash)
    })
    .await?;

    if matches {
        Ok(Some(from_row(&row)?))
    } else {
        warn!("Rejected password for user {}", username.trim());
        Ok(None)
    }
}

/// Issue a new session token valid for `ttl`
pub async fn create_session(pool: &SqlitePool, user_id: Uuid, ttl: Duration) -> Result<Session> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| Error::InvalidInput(format!("Session lifetime out of range: {}", ttl)))?;
    let session = Session {
        token: generate_token(),
        user_id,
        expires_at,
    };

    sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(token_digest(&session.token))
        .bind(session.user_id.to_string())
        .bind(now)
        .bind(session.expires_at)
        .execute(pool)
        .await?;

    Ok(session)
}

/// Resolve a session token to its user, ignoring expired sessions
pub async fn user_for_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT u.guid, u.username, u.is_admin, u.created_at
        FROM sessions s
        JOIN users u ON u.guid = s.user_id
        WHERE s.token_hash = ? AND s.expires_at > ?
        "#,
    )
    .bind(token_digest(token))
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(from_row).transpose()
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_digest(token))
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Drop sessions past their expiry, returning how many were removed
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Create the `admin` account on first start
///
/// Does nothing when the account already exists; the stored password is
/// never overwritten.
pub async fn ensure_admin(pool: &SqlitePool, password: &str) -> Result<Option<User>> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(ADMIN_USERNAME)
        .fetch_one(pool)
        .await?;

    if exists {
        return Ok(None);
    }

    create_user(pool, ADMIN_USERNAME, password, true).await.map(Some)
}
