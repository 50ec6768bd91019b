//! Database schema migrations.
//!
//! Uses a simple version table approach to track applied migrations.
//! Each migration is a SQL batch that transforms the schema.

use std::num::ParseIntError;

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Migration list: (version, SQL).
///
/// Migrations must be applied in order. All migrations are idempotent using
/// CREATE IF NOT EXISTS.
const MIGRATIONS: &[(&str, &str)] = &[
    ("1", include_str!("../../migrations/001_documents.sql")),
    ("2", include_str!("../../migrations/002_documents_vocab.sql")),
];

/// Statements that remove every object the migrations create.
const TEARDOWN: &str = "DROP TABLE IF EXISTS documents_vocab;
     DROP TRIGGER IF EXISTS documents_ai;
     DROP TRIGGER IF EXISTS documents_ad;
     DROP TRIGGER IF EXISTS documents_au;
     DROP TABLE IF EXISTS documents_fts;
     DROP TABLE IF EXISTS documents;
     DELETE FROM _migrations;";

fn apply_pending(conn: &rusqlite::Connection) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )
    .map_err(Error::from)?;

    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))
        .map_err(Error::from)?;

    for (version, sql) in MIGRATIONS {
        let version_num: i64 = version
            .parse()
            .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
        if version_num > current {
            conn.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("v{version_num}: {e}")))?;
            conn.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version_num, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(Error::from)?;
            tracing::debug!(version = version_num, "applied cache migration");
        }
    }

    Ok(())
}

/// Run any pending migrations.
///
/// This creates the _migrations table if it doesn't exist, checks the
/// current version, and applies any migrations that haven't been run yet.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> { apply_pending(conn) })
        .await
        .map_err(Error::from)
}

/// Drop the cache schema and recreate it from scratch.
///
/// Runs in a single transaction so readers never observe a half-built schema.
pub async fn reset(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let tx = conn.transaction().map_err(Error::from)?;
        tx.execute_batch(TEARDOWN).map_err(Error::from)?;
        apply_pending(&tx)?;
        tx.commit().map_err(Error::from)
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_exists(conn: &Connection, name: &'static str) -> bool {
        conn.call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE name = ?1)",
                params![name],
                |row| row.get(0),
            )
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        assert!(table_exists(&conn, "documents").await);
        assert!(table_exists(&conn, "documents_fts").await);
        assert!(table_exists(&conn, "documents_vocab").await);
    }

    #[tokio::test]
    async fn test_migrations_version_tracking() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_reset_recreates_schema() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        conn.call(|conn| {
            conn.execute(
                "INSERT INTO documents (doc_key, title, url, full_url, type, timestamp)
                 VALUES ('k', 't', 'u', 'https://u/', 'all', '2025-01-01T00:00:00Z')",
                [],
            )
        })
        .await
        .unwrap();

        reset(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(table_exists(&conn, "documents_fts").await);
        assert!(table_exists(&conn, "documents_vocab").await);
    }
}
