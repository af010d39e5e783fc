//! Database initialization
//!
//! Creates the database on first run and brings an existing one up to the
//! current schema. Every statement is idempotent, so this runs on each start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Current schema version recorded in `schema_version`
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Pipeline stages seeded into an empty database, in board order
pub const DEFAULT_PIPELINE_STAGES: [&str; 6] =
    ["Lead", "Qualified", "Proposal", "Negotiation", "Won", "Lost"];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys and busy timeout are per-connection settings, so they go
    // on the connect options rather than a one-off PRAGMA.
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    prepare_schema(&pool).await?;
    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// The pool holds exactly one connection: each SQLite in-memory connection
/// is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    prepare_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes, then seed reference data
pub async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_tables(pool).await?;
    create_companies_table(pool).await?;
    create_contacts_table(pool).await?;
    create_pipeline_tables(pool).await?;

    // Flaggable children
    create_contact_emails_table(pool).await?;
    create_areas_of_activity_table(pool).await?;
    create_email_accounts_table(pool).await?;
    create_signatures_table(pool).await?;
    create_synergies_table(pool).await?;

    seed_pipeline_stages(pool).await?;
    record_schema_version(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    let result = sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!("Database schema initialized at v{}", CURRENT_SCHEMA_VERSION);
    }
    Ok(())
}

async fn create_users_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            expires_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_companies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            industry TEXT,
            website TEXT,
            notes TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_contacts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            guid TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone TEXT,
            notes TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_pipeline_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_stages (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            position INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deals (
            guid TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            value_cents INTEGER NOT NULL DEFAULT 0,
            stage_id TEXT NOT NULL REFERENCES pipeline_stages(guid),
            company_id TEXT REFERENCES companies(guid) ON DELETE SET NULL,
            contact_id TEXT REFERENCES contacts(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_deals_stage ON deals(stage_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn seed_pipeline_stages(pool: &SqlitePool) -> Result<()> {
    for (position, name) in DEFAULT_PIPELINE_STAGES.iter().enumerate() {
        sqlx::query(
            "INSERT OR IGNORE INTO pipeline_stages (guid, name, position) VALUES (?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(*name)
        .bind(position as i64)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn create_contact_emails_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contact_emails (
            guid TEXT PRIMARY KEY,
            contact_id TEXT NOT NULL REFERENCES contacts(guid) ON DELETE CASCADE,
            email TEXT NOT NULL,
            label TEXT,
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_group_indexes(pool, "contact_emails", "contact_id", "is_primary", None).await
}

async fn create_areas_of_activity_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS areas_of_activity (
            guid TEXT PRIMARY KEY,
            contact_id TEXT NOT NULL REFERENCES contacts(guid) ON DELETE CASCADE,
            company_id TEXT NOT NULL REFERENCES companies(guid) ON DELETE CASCADE,
            role TEXT,
            job_description TEXT,
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_group_indexes(pool, "areas_of_activity", "contact_id", "is_primary", None).await
}

async fn create_email_accounts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_accounts (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            email TEXT NOT NULL,
            display_name TEXT,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_group_indexes(pool, "email_accounts", "user_id", "is_default", None).await
}

async fn create_signatures_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signatures (
            guid TEXT PRIMARY KEY,
            account_id TEXT NOT NULL REFERENCES email_accounts(guid) ON DELETE CASCADE,
            name TEXT NOT NULL,
            body TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_group_indexes(pool, "signatures", "account_id", "is_default", None).await
}

async fn create_synergies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS synergies (
            guid TEXT PRIMARY KEY,
            contact_id TEXT NOT NULL REFERENCES contacts(guid) ON DELETE CASCADE,
            company_id TEXT REFERENCES companies(guid) ON DELETE SET NULL,
            deal_id TEXT REFERENCES deals(guid) ON DELETE SET NULL,
            description TEXT,
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            deleted_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_group_indexes(
        pool,
        "synergies",
        "contact_id",
        "is_primary",
        Some("deleted_at IS NULL"),
    )
    .await
}

/// Group lookup index plus the partial unique index that allows at most one
/// flagged live row per group.
async fn create_group_indexes(
    pool: &SqlitePool,
    table: &str,
    group_column: &str,
    flag_column: &str,
    live_predicate: Option<&str>,
) -> Result<()> {
    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_{group_column} ON {table}({group_column})"
    ))
    .execute(pool)
    .await?;

    let predicate = match live_predicate {
        Some(live) => format!("{flag_column} = 1 AND {live}"),
        None => format!("{flag_column} = 1"),
    };

    sqlx::query(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_one_{flag_column} \
         ON {table}({group_column}) WHERE {predicate}"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_schema() {
        let pool = init_memory_database().await.unwrap();

        for table in [
            "users",
            "sessions",
            "companies",
            "contacts",
            "pipeline_stages",
            "deals",
            "contact_emails",
            "areas_of_activity",
            "email_accounts",
            "signatures",
            "synergies",
        ] {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert!(exists, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_prepare_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        prepare_schema(&pool).await.unwrap();

        let stages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pipeline_stages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stages, DEFAULT_PIPELINE_STAGES.len() as i64);

        let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[tokio::test]
    async fn test_partial_unique_index_rejects_second_primary() {
        let pool = init_memory_database().await.unwrap();
        let contact = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO contacts (guid, first_name, last_name) VALUES (?, 'Ada', 'Lovelace')")
            .bind(&contact)
            .execute(&pool)
            .await
            .unwrap();

        let insert = "INSERT INTO contact_emails (guid, contact_id, email, is_primary) VALUES (?, ?, ?, 1)";
        sqlx::query(insert)
            .bind(Uuid::new_v4().to_string())
            .bind(&contact)
            .bind("a@example.com")
            .execute(&pool)
            .await
            .unwrap();

        let second = sqlx::query(insert)
            .bind(Uuid::new_v4().to_string())
            .bind(&contact)
            .bind("b@example.com")
            .execute(&pool)
            .await;

        let err = second.expect_err("second primary must be rejected");
        assert!(err.as_database_error().unwrap().is_unique_violation());
    }
}
