//! Schema bootstrap.
//!
//! Unlike the additive, column-by-column migrations a long-lived app
//! database needs, a schema version bump here always means "nothing in the
//! catalog can be trusted", since the catalog is wholly rederived from the
//! filesystem by a rescan. So there is exactly one migration step: create
//! the current tables if they're missing, and if the stored version is
//! older than current, drop and recreate rather than chase an ALTER chain.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::error::CatalogError;

pub const SCHEMA_VERSION: i64 = 1;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_info (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS detail (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT,
    size INTEGER NOT NULL,
    modified_at INTEGER NOT NULL,
    title TEXT NOT NULL,
    creator TEXT,
    artist TEXT,
    album TEXT,
    genre TEXT,
    comment TEXT,
    date TEXT,
    duration_ms INTEGER,
    channels INTEGER,
    sample_rate_hz INTEGER,
    bitrate_bps INTEGER,
    resolution TEXT,
    mime TEXT,
    dlna_profile TEXT,
    media_kind TEXT NOT NULL DEFAULT 'none'
);

CREATE TABLE IF NOT EXISTS object (
    object_id TEXT PRIMARY KEY,
    parent_id TEXT NOT NULL,
    ref_id TEXT,
    class TEXT NOT NULL,
    name TEXT NOT NULL,
    detail_id INTEGER REFERENCES detail(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_object_parent ON object(parent_id);
CREATE INDEX IF NOT EXISTS idx_object_detail ON object(detail_id);

CREATE TABLE IF NOT EXISTS caption (
    detail_id INTEGER NOT NULL REFERENCES detail(id) ON DELETE CASCADE,
    caption_path TEXT NOT NULL,
    PRIMARY KEY (detail_id, caption_path)
);
"#;

/// Open the catalog database at `db_path`, creating and bootstrapping it if
/// necessary. If an existing database carries an older schema version, its
/// content tables are dropped and recreated empty (the caller is expected
/// to follow with a full rescan).
pub async fn open_or_rebuild(db_path: &Path) -> Result<SqlitePool, CatalogError> {
    let db_url = format!("sqlite://{}", db_path.display());

    if !sqlx::Sqlite::database_exists(&db_url)
        .await
        .unwrap_or(false)
    {
        tracing::info!(path = %db_path.display(), "creating catalog database");
        sqlx::Sqlite::create_database(&db_url).await?;
    }

    let options = SqliteConnectOptions::from_str(&db_url)
        .map_err(sqlx::Error::from)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    sqlx::query(CREATE_TABLES).execute(&pool).await?;

    let stored_version: Option<i64> = sqlx::query("SELECT version FROM schema_info WHERE id = 1")
        .fetch_optional(&pool)
        .await?
        .map(|row| row.get::<i64, _>("version"));

    match stored_version {
        None => {
            sqlx::query("INSERT INTO schema_info (id, version) VALUES (1, ?)")
                .bind(SCHEMA_VERSION)
                .execute(&pool)
                .await?;
        }
        Some(v) if v == SCHEMA_VERSION => {}
        Some(v) if v < SCHEMA_VERSION => {
            tracing::warn!(found = v, current = SCHEMA_VERSION, "rebuilding catalog for schema upgrade");
            rebuild(&pool).await?;
        }
        Some(v) => {
            return Err(CatalogError::UnsupportedSchemaVersion {
                found: v,
                supported: SCHEMA_VERSION,
            })
        }
    }

    Ok(pool)
}

async fn rebuild(pool: &SqlitePool) -> Result<(), CatalogError> {
    sqlx::query("DROP TABLE IF EXISTS caption").execute(pool).await?;
    sqlx::query("DROP TABLE IF EXISTS object").execute(pool).await?;
    sqlx::query("DROP TABLE IF EXISTS detail").execute(pool).await?;
    sqlx::query(CREATE_TABLES).execute(pool).await?;
    sqlx::query("UPDATE schema_info SET version = ? WHERE id = 1")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstraps_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("files.db");
        let pool = open_or_rebuild(&db_path).await.unwrap();
        let version: i64 = sqlx::query("SELECT version FROM schema_info WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("files.db");
        open_or_rebuild(&db_path).await.unwrap();
        let pool = open_or_rebuild(&db_path).await.unwrap();
        let count: i64 = sqlx::query("SELECT COUNT(*) as c FROM detail")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("c");
        assert_eq!(count, 0);
    }
}
