//! Single-primary-record toggler
//!
//! Several child tables mark one row per parent as the primary (or default)
//! one: a contact's main email, a user's default sending account, and so on.
//! The rules are the same for all of them, so they are implemented once here
//! and parameterised by a [`PrimaryScope`].
//!
//! # Invariant
//!
//! For every group key, at most one live row has the flag set. In addition:
//!
//! - The first row inserted into an empty group is flagged even when the
//!   caller did not ask for it.
//! - Deleting the flagged row flags the oldest remaining live row of the
//!   group, if any.
//!
//! # Atomicity
//!
//! Demote-then-promote always runs inside one transaction. Each flaggable
//! table also carries a partial unique index on `(group) WHERE flag = 1`, so
//! a second flagged row is rejected by SQLite itself. A rejected write, a
//! busy/locked database, or a promote that matches no row is reported as
//! [`Error::Conflict`].
//!
//! Functions taking a `&mut SqliteConnection` expect the caller to hold an
//! open transaction; functions taking a pool open and commit their own.

use crate::{Error, Result};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// How rows leave a flaggable table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStyle {
    /// `DELETE FROM`
    Hard,
    /// Timestamp the given column; rows with it set are no longer live
    Soft { column: &'static str },
}

/// Describes one "one primary row per group" relationship
///
/// All names are compile-time identifiers and are interpolated into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryScope {
    pub table: &'static str,
    pub group_column: &'static str,
    pub flag_column: &'static str,
    pub delete_style: DeleteStyle,
}

impl PrimaryScope {
    /// Extra `WHERE` condition selecting live rows (empty for hard deletes)
    fn live_filter(&self) -> String {
        match self.delete_style {
            DeleteStyle::Hard => String::new(),
            DeleteStyle::Soft { column } => format!(" AND {} IS NULL", column),
        }
    }
}

pub const CONTACT_EMAILS: PrimaryScope = PrimaryScope {
    table: "contact_emails",
    group_column: "contact_id",
    flag_column: "is_primary",
    delete_style: DeleteStyle::Hard,
};

pub const AREAS_OF_ACTIVITY: PrimaryScope = PrimaryScope {
    table: "areas_of_activity",
    group_column: "contact_id",
    flag_column: "is_primary",
    delete_style: DeleteStyle::Hard,
};

pub const EMAIL_ACCOUNTS: PrimaryScope = PrimaryScope {
    table: "email_accounts",
    group_column: "user_id",
    flag_column: "is_default",
    delete_style: DeleteStyle::Hard,
};

pub const SIGNATURES: PrimaryScope = PrimaryScope {
    table: "signatures",
    group_column: "account_id",
    flag_column: "is_default",
    delete_style: DeleteStyle::Hard,
};

pub const SYNERGIES: PrimaryScope = PrimaryScope {
    table: "synergies",
    group_column: "contact_id",
    flag_column: "is_primary",
    delete_style: DeleteStyle::Soft {
        column: "deleted_at",
    },
};

/// Every flaggable relationship in the schema
pub const ALL_SCOPES: [PrimaryScope; 5] = [
    CONTACT_EMAILS,
    AREAS_OF_ACTIVITY,
    EMAIL_ACCOUNTS,
    SIGNATURES,
    SYNERGIES,
];

/// Group and flag of one live row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagState {
    pub group_id: Uuid,
    pub is_primary: bool,
}

/// Look up the group and flag of a live row
pub async fn flag_state(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    record_id: Uuid,
) -> Result<Option<FlagState>> {
    let row: Option<(String, bool)> = sqlx::query_as(&format!(
        "SELECT {}, {} FROM {} WHERE guid = ?{}",
        scope.group_column,
        scope.flag_column,
        scope.table,
        scope.live_filter()
    ))
    .bind(record_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|(group, is_primary)| {
        Uuid::parse_str(&group)
            .map(|group_id| FlagState { group_id, is_primary })
            .map_err(|e| Error::Internal(format!("Invalid group key in {}: {}", scope.table, e)))
    })
    .transpose()
}

/// Resolve a record inside its expected group
///
/// Returns the record's flag state, `None` when the record does not exist,
/// and [`Error::InvalidInput`] when it belongs to a different group.
pub async fn locate(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
    record_id: Uuid,
) -> Result<Option<FlagState>> {
    match flag_state(conn, scope, record_id).await? {
        None => Ok(None),
        Some(state) if state.group_id != group_id => Err(Error::InvalidInput(format!(
            "{} {} does not belong to {} {}",
            scope.table, record_id, scope.group_column, group_id
        ))),
        Some(state) => Ok(Some(state)),
    }
}

/// Number of live rows in a group
pub async fn live_count(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?{}",
        scope.table,
        scope.group_column,
        scope.live_filter()
    ))
    .bind(group_id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Number of flagged live rows in a group (0 or 1 while the invariant holds)
pub async fn primary_count(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ? AND {} = 1{}",
        scope.table,
        scope.group_column,
        scope.flag_column,
        scope.live_filter()
    ))
    .bind(group_id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Id of the flagged live row in a group, if any
pub async fn primary_id(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
) -> Result<Option<Uuid>> {
    let id: Option<String> = sqlx::query_scalar(&format!(
        "SELECT guid FROM {} WHERE {} = ? AND {} = 1{}",
        scope.table,
        scope.group_column,
        scope.flag_column,
        scope.live_filter()
    ))
    .bind(group_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    id.map(|raw| {
        Uuid::parse_str(&raw)
            .map_err(|e| Error::Internal(format!("Invalid guid in {}: {}", scope.table, e)))
    })
    .transpose()
}

/// Decide the flag of a row about to be inserted into `group_id`
///
/// When the caller requests the flag, every existing row of the group is
/// demoted first. Otherwise the row is flagged only if the group is empty.
/// The insert itself must follow on the same connection.
pub async fn prepare_insert(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
    requested_primary: bool,
) -> Result<bool> {
    if requested_primary {
        demote_group(conn, scope, group_id, None).await?;
        return Ok(true);
    }

    Ok(live_count(conn, scope, group_id).await? == 0)
}

/// Make `record_id` the only flagged row of its group
///
/// The record must already be known to live in `group_id` (see [`locate`]).
/// Idempotent.
pub async fn promote(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
    record_id: Uuid,
) -> Result<()> {
    demote_group(conn, scope, group_id, Some(record_id)).await?;

    let result = sqlx::query(&format!(
        "UPDATE {} SET {} = 1 WHERE guid = ? AND {} = ?{}",
        scope.table,
        scope.flag_column,
        scope.group_column,
        scope.live_filter()
    ))
    .bind(record_id.to_string())
    .bind(group_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::from_flag_write(e, scope.table))?;

    if result.rows_affected() != 1 {
        return Err(Error::Conflict(format!(
            "{} {} changed while being made primary ({} rows matched)",
            scope.table,
            record_id,
            result.rows_affected()
        )));
    }

    Ok(())
}

/// Clear the flag of a single row, leaving the group without a primary
pub async fn clear(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    record_id: Uuid,
) -> Result<()> {
    sqlx::query(&format!(
        "UPDATE {} SET {} = 0 WHERE guid = ?",
        scope.table, scope.flag_column
    ))
    .bind(record_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::from_flag_write(e, scope.table))?;

    Ok(())
}

/// Apply an optional flag change from an update request
pub async fn apply_flag(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
    record_id: Uuid,
    flag: Option<bool>,
) -> Result<()> {
    match flag {
        Some(true) => promote(conn, scope, group_id, record_id).await,
        Some(false) => clear(conn, scope, record_id).await,
        None => Ok(()),
    }
}

/// Flag the oldest live row of a group, returning its id
pub async fn promote_successor(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
) -> Result<Option<Uuid>> {
    let next: Option<String> = sqlx::query_scalar(&format!(
        "SELECT guid FROM {} WHERE {} = ?{} ORDER BY rowid LIMIT 1",
        scope.table,
        scope.group_column,
        scope.live_filter()
    ))
    .bind(group_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(raw) = next else {
        return Ok(None);
    };

    let successor = Uuid::parse_str(&raw)
        .map_err(|e| Error::Internal(format!("Invalid guid in {}: {}", scope.table, e)))?;
    promote(conn, scope, group_id, successor).await?;

    Ok(Some(successor))
}

/// Remove a live row (hard or soft) and promote a successor if it was primary
///
/// Returns whether the row existed.
pub async fn remove(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
    record_id: Uuid,
) -> Result<bool> {
    let Some(state) = locate(conn, scope, group_id, record_id).await? else {
        return Ok(false);
    };

    match scope.delete_style {
        DeleteStyle::Hard => {
            sqlx::query(&format!("DELETE FROM {} WHERE guid = ?", scope.table))
                .bind(record_id.to_string())
                .execute(&mut *conn)
                .await?;
        }
        DeleteStyle::Soft { column } => {
            sqlx::query(&format!(
                "UPDATE {} SET {} = ?, {} = 0 WHERE guid = ?",
                scope.table, column, scope.flag_column
            ))
            .bind(Utc::now())
            .bind(record_id.to_string())
            .execute(&mut *conn)
            .await?;
        }
    }

    if state.is_primary {
        let successor = promote_successor(conn, scope, group_id).await?;
        debug!(
            table = scope.table,
            removed = %record_id,
            successor = ?successor,
            "Primary row removed"
        );
    }

    Ok(true)
}

/// Transactional set-primary
///
/// Returns `false` when the record does not exist. Fails with
/// [`Error::InvalidInput`] when it belongs to another group.
pub async fn set_primary(
    pool: &SqlitePool,
    scope: &PrimaryScope,
    group_id: Uuid,
    record_id: Uuid,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    if locate(&mut *tx, scope, group_id, record_id).await?.is_none() {
        return Ok(false);
    }

    promote(&mut *tx, scope, group_id, record_id).await?;
    tx.commit().await?;

    debug!(table = scope.table, group = %group_id, record = %record_id, "Primary row set");
    Ok(true)
}

/// Transactional delete with promotion of a successor
pub async fn delete(
    pool: &SqlitePool,
    scope: &PrimaryScope,
    group_id: Uuid,
    record_id: Uuid,
) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let removed = remove(&mut *tx, scope, group_id, record_id).await?;
    tx.commit().await?;
    Ok(removed)
}

/// Demote flagged rows of a group, optionally sparing one
async fn demote_group(
    conn: &mut SqliteConnection,
    scope: &PrimaryScope,
    group_id: Uuid,
    keep: Option<Uuid>,
) -> Result<u64> {
    let mut sql = format!(
        "UPDATE {} SET {} = 0 WHERE {} = ? AND {} = 1",
        scope.table, scope.flag_column, scope.group_column, scope.flag_column
    );
    if keep.is_some() {
        sql.push_str(" AND guid <> ?");
    }

    let mut query = sqlx::query(&sql).bind(group_id.to_string());
    if let Some(keep) = keep {
        query = query.bind(keep.to_string());
    }

    let result = query
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::from_flag_write(e, scope.table))?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    async fn insert_contact(pool: &SqlitePool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO contacts (guid, first_name, last_name) VALUES (?, 'Grace', 'Hopper')")
            .bind(id.to_string())
            .execute(pool)
            .await
            .unwrap();
        id
    }

    /// Insert through the toggler the way repositories do
    async fn create_email(pool: &SqlitePool, contact: Uuid, requested: bool) -> Uuid {
        let mut tx = pool.begin().await.unwrap();
        let flag = prepare_insert(&mut *tx, &CONTACT_EMAILS, contact, requested)
            .await
            .unwrap();
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO contact_emails (guid, contact_id, email, is_primary) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(contact.to_string())
            .bind(format!("{}@example.com", id.simple()))
            .bind(flag)
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        id
    }

    async fn is_primary(pool: &SqlitePool, id: Uuid) -> bool {
        sqlx::query_scalar("SELECT is_primary FROM contact_emails WHERE guid = ?")
            .bind(id.to_string())
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn count_primary(pool: &SqlitePool, scope: &PrimaryScope, group: Uuid) -> i64 {
        let mut conn = pool.acquire().await.unwrap();
        primary_count(&mut *conn, scope, group).await.unwrap()
    }

    #[tokio::test]
    async fn test_first_row_becomes_primary() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;

        let first = create_email(&pool, contact, false).await;
        let second = create_email(&pool, contact, false).await;

        assert!(is_primary(&pool, first).await);
        assert!(!is_primary(&pool, second).await);
    }

    #[tokio::test]
    async fn test_requested_primary_demotes_existing() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;

        let first = create_email(&pool, contact, false).await;
        let second = create_email(&pool, contact, true).await;

        assert!(!is_primary(&pool, first).await);
        assert!(is_primary(&pool, second).await);
        assert_eq!(count_primary(&pool, &CONTACT_EMAILS, contact).await, 1);
    }

    #[tokio::test]
    async fn test_set_primary_swaps_flag() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;
        let e1 = create_email(&pool, contact, false).await;
        let e2 = create_email(&pool, contact, false).await;

        assert!(set_primary(&pool, &CONTACT_EMAILS, contact, e2).await.unwrap());

        assert!(!is_primary(&pool, e1).await);
        assert!(is_primary(&pool, e2).await);
    }

    #[tokio::test]
    async fn test_set_primary_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;
        let e1 = create_email(&pool, contact, false).await;
        let e2 = create_email(&pool, contact, false).await;

        assert!(set_primary(&pool, &CONTACT_EMAILS, contact, e2).await.unwrap());
        assert!(set_primary(&pool, &CONTACT_EMAILS, contact, e2).await.unwrap());

        assert!(!is_primary(&pool, e1).await);
        assert!(is_primary(&pool, e2).await);
        assert_eq!(count_primary(&pool, &CONTACT_EMAILS, contact).await, 1);
    }

    #[tokio::test]
    async fn test_set_primary_unknown_record() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;

        let found = set_primary(&pool, &CONTACT_EMAILS, contact, Uuid::new_v4())
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn test_set_primary_rejects_foreign_group() {
        let pool = init_memory_database().await.unwrap();
        let a = insert_contact(&pool).await;
        let b = insert_contact(&pool).await;
        let _a1 = create_email(&pool, a, false).await;
        let b1 = create_email(&pool, b, false).await;

        let result = set_primary(&pool, &CONTACT_EMAILS, a, b1).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_groups_are_isolated() {
        let pool = init_memory_database().await.unwrap();
        let a = insert_contact(&pool).await;
        let b = insert_contact(&pool).await;
        let a1 = create_email(&pool, a, false).await;
        let a2 = create_email(&pool, a, false).await;
        let b1 = create_email(&pool, b, false).await;

        set_primary(&pool, &CONTACT_EMAILS, a, a2).await.unwrap();

        assert!(!is_primary(&pool, a1).await);
        assert!(is_primary(&pool, b1).await);
        assert_eq!(count_primary(&pool, &CONTACT_EMAILS, b).await, 1);
    }

    #[tokio::test]
    async fn test_delete_primary_promotes_one_remaining() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;
        let e1 = create_email(&pool, contact, false).await;
        let e2 = create_email(&pool, contact, false).await;
        let e3 = create_email(&pool, contact, false).await;

        assert!(delete(&pool, &CONTACT_EMAILS, contact, e1).await.unwrap());

        let flags = [is_primary(&pool, e2).await, is_primary(&pool, e3).await];
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        // Oldest remaining row wins
        assert!(flags[0]);
    }

    #[tokio::test]
    async fn test_delete_non_primary_has_no_side_effect() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;
        let e1 = create_email(&pool, contact, false).await;
        let e2 = create_email(&pool, contact, false).await;

        assert!(delete(&pool, &CONTACT_EMAILS, contact, e2).await.unwrap());
        assert!(is_primary(&pool, e1).await);
    }

    #[tokio::test]
    async fn test_delete_last_row_leaves_empty_group() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;
        let e1 = create_email(&pool, contact, false).await;

        assert!(delete(&pool, &CONTACT_EMAILS, contact, e1).await.unwrap());
        assert!(!delete(&pool, &CONTACT_EMAILS, contact, e1).await.unwrap());
        assert_eq!(count_primary(&pool, &CONTACT_EMAILS, contact).await, 0);
    }

    #[tokio::test]
    async fn test_invariant_over_mixed_operations() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;
        let mut ids = Vec::new();

        for step in 0..12 {
            ids.push(create_email(&pool, contact, step % 3 == 0).await);
            if step % 4 == 1 {
                let target = ids[step / 2];
                set_primary(&pool, &CONTACT_EMAILS, contact, target).await.unwrap();
            }
            if step % 5 == 4 {
                let victim = ids.remove(0);
                delete(&pool, &CONTACT_EMAILS, contact, victim).await.unwrap();
            }
            assert_eq!(count_primary(&pool, &CONTACT_EMAILS, contact).await, 1);
        }
    }

    #[tokio::test]
    async fn test_soft_delete_scope() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;
        let company = Uuid::new_v4();
        sqlx::query("INSERT INTO companies (guid, name) VALUES (?, 'Initech')")
            .bind(company.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let mut ids = Vec::new();
        for _ in 0..2 {
            let mut tx = pool.begin().await.unwrap();
            let flag = prepare_insert(&mut *tx, &SYNERGIES, contact, false).await.unwrap();
            let id = Uuid::new_v4();
            sqlx::query("INSERT INTO synergies (guid, contact_id, company_id, is_primary) VALUES (?, ?, ?, ?)")
                .bind(id.to_string())
                .bind(contact.to_string())
                .bind(company.to_string())
                .bind(flag)
                .execute(&mut *tx)
                .await
                .unwrap();
            tx.commit().await.unwrap();
            ids.push(id);
        }

        assert!(delete(&pool, &SYNERGIES, contact, ids[0]).await.unwrap());

        let mut conn = pool.acquire().await.unwrap();
        // Soft-deleted row is kept but no longer live
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM synergies")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(live_count(&mut *conn, &SYNERGIES, contact).await.unwrap(), 1);
        assert_eq!(primary_id(&mut *conn, &SYNERGIES, contact).await.unwrap(), Some(ids[1]));
        assert!(flag_state(&mut *conn, &SYNERGIES, ids[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_promote_missing_row_is_conflict() {
        let pool = init_memory_database().await.unwrap();
        let contact = insert_contact(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        let result = promote(&mut *tx, &CONTACT_EMAILS, contact, Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_scopes_cover_each_table_once() {
        let mut tables: Vec<_> = ALL_SCOPES.iter().map(|s| s.table).collect();
        tables.sort();
        tables.dedup();
        assert_eq!(tables.len(), ALL_SCOPES.len());
    }
}
