//! The catalog: Detail and Object rows, plus the change counter that feeds
//! `SystemUpdateID`.

use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::{Row, SqlitePool};

use dms_core::{Detail, MediaKind, Object};

use crate::error::CatalogError;

pub struct CatalogStore {
    pool: SqlitePool,
    /// Counts committed row changes since the server started. Deliberately
    /// not sqlite's own `total_changes()` pragma, which would also count
    /// schema bootstrap statements; `SystemUpdateID` must track only
    /// catalog content changes.
    changes: AtomicU64,
}

impl CatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogStore {
            pool,
            changes: AtomicU64::new(0),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Total catalog row changes observed since this store was opened.
    pub fn total_changes(&self) -> u64 {
        self.changes.load(Ordering::Relaxed)
    }

    fn bump(&self) {
        self.changes.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn put_detail(&self, detail: &Detail) -> Result<i64, CatalogError> {
        let id = sqlx::query(
            r#"
            INSERT INTO detail
                (path, size, modified_at, title, creator, artist, album, genre,
                 comment, date, duration_ms, channels, sample_rate_hz, bitrate_bps,
                 resolution, mime, dlna_profile, media_kind)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&detail.path)
        .bind(detail.size)
        .bind(detail.modified_at)
        .bind(&detail.title)
        .bind(&detail.creator)
        .bind(&detail.artist)
        .bind(&detail.album)
        .bind(&detail.genre)
        .bind(&detail.comment)
        .bind(&detail.date)
        .bind(detail.duration_ms)
        .bind(detail.channels)
        .bind(detail.sample_rate_hz)
        .bind(detail.bitrate_bps)
        .bind(&detail.resolution)
        .bind(&detail.mime)
        .bind(&detail.dlna_profile)
        .bind(media_kind_str(detail.media_kind))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.bump();
        Ok(id)
    }

    pub async fn delete_detail(&self, id: i64) -> Result<(), CatalogError> {
        sqlx::query("DELETE FROM detail WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.bump();
        Ok(())
    }

    pub async fn get_detail(&self, id: i64) -> Result<Option<Detail>, CatalogError> {
        let row = sqlx::query("SELECT * FROM detail WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| detail_from_row(&r)))
    }

    /// Insert `object`. Fails with [`CatalogError::DuplicateId`] if
    /// `object_id` is already present; objects are never silently
    /// overwritten, matching the id-minting contract (ids are unique for
    /// the lifetime of the thing they name).
    pub async fn put_object(&self, object: &Object) -> Result<(), CatalogError> {
        let result = sqlx::query(
            r#"
            INSERT INTO object (object_id, parent_id, ref_id, class, name, detail_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&object.object_id)
        .bind(&object.parent_id)
        .bind(&object.ref_id)
        .bind(&object.class)
        .bind(&object.name)
        .bind(object.detail_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                self.bump();
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CatalogError::DuplicateId(object.object_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_object(&self, object_id: &str) -> Result<(), CatalogError> {
        sqlx::query("DELETE FROM object WHERE object_id = ?")
            .bind(object_id)
            .execute(&self.pool)
            .await?;
        self.bump();
        Ok(())
    }

    /// The sidecar subtitle path paired with `detail_id`, if any (first
    /// match; a Detail is only ever paired with one caption track today).
    pub async fn get_caption(&self, detail_id: i64) -> Result<Option<String>, CatalogError> {
        let row = sqlx::query("SELECT caption_path FROM caption WHERE detail_id = ? LIMIT 1")
            .bind(detail_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("caption_path")))
    }

    pub async fn get_object(&self, object_id: &str) -> Result<Option<Object>, CatalogError> {
        let row = sqlx::query("SELECT * FROM object WHERE object_id = ?")
            .bind(object_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| object_from_row(&r)))
    }

    /// `order_by` must be a column the sort translator has already
    /// validated (e.g. `"name COLLATE NOCASE ASC"`); it is interpolated
    /// directly since sqlite does not accept `ORDER BY` as a bind
    /// parameter. `limit < 0` means unbounded.
    pub async fn list_children(
        &self,
        parent_id: &str,
        offset: i64,
        limit: i64,
        order_by: &str,
    ) -> Result<Vec<Object>, CatalogError> {
        let limit_clause = if limit < 0 { "-1".to_string() } else { limit.to_string() };
        let sql = format!(
            "SELECT object.* FROM object LEFT JOIN detail ON detail.id = object.detail_id \
             WHERE parent_id = ? ORDER BY {order_by} LIMIT {limit_clause} OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(parent_id)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(object_from_row).collect())
    }

    pub async fn count_children(&self, parent_id: &str) -> Result<i64, CatalogError> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM object WHERE parent_id = ?")
            .bind(parent_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("c"))
    }

    /// All objects whose `object_id` matches `glob` (sqlite `GLOB`, case
    /// sensitive), used for descendant-of-X queries via
    /// `dms_core::ids::descendants_glob`, further narrowed by
    /// `predicate_sql` — a boolean expression over `object.*`/`detail.*`
    /// columns built by the search translator, with `?` placeholders bound
    /// from `params` in order. The translator must never interpolate a
    /// search literal directly into `predicate_sql`; literals always travel
    /// through `params` so a crafted `SearchCriteria` string cannot inject
    /// SQL.
    pub async fn find_by_glob(
        &self,
        glob: &str,
        predicate_sql: Option<&str>,
        params: &[String],
        order_by: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Object>, CatalogError> {
        let limit_clause = if limit < 0 { "-1".to_string() } else { limit.to_string() };
        let predicate_clause = predicate_sql
            .map(|p| format!(" AND ({p})"))
            .unwrap_or_default();
        let sql = format!(
            "SELECT object.* FROM object LEFT JOIN detail ON detail.id = object.detail_id \
             WHERE object_id GLOB ?{predicate_clause} ORDER BY {order_by} LIMIT {limit_clause} OFFSET ?"
        );
        let mut query = sqlx::query(&sql).bind(glob);
        for p in params {
            query = query.bind(p);
        }
        let rows = query.bind(offset).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(object_from_row).collect())
    }
}

fn media_kind_str(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "video",
        MediaKind::Audio => "audio",
        MediaKind::Image => "image",
        MediaKind::Nfo => "nfo",
        MediaKind::None => "none",
    }
}

fn media_kind_from_str(s: &str) -> MediaKind {
    match s {
        "video" => MediaKind::Video,
        "audio" => MediaKind::Audio,
        "image" => MediaKind::Image,
        "nfo" => MediaKind::Nfo,
        _ => MediaKind::None,
    }
}

fn detail_from_row(row: &sqlx::sqlite::SqliteRow) -> Detail {
    Detail {
        id: row.get("id"),
        path: row.get("path"),
        size: row.get("size"),
        modified_at: row.get("modified_at"),
        title: row.get("title"),
        creator: row.get("creator"),
        artist: row.get("artist"),
        album: row.get("album"),
        genre: row.get("genre"),
        comment: row.get("comment"),
        date: row.get("date"),
        duration_ms: row.get("duration_ms"),
        channels: row.get("channels"),
        sample_rate_hz: row.get("sample_rate_hz"),
        bitrate_bps: row.get("bitrate_bps"),
        resolution: row.get("resolution"),
        mime: row.get("mime"),
        dlna_profile: row.get("dlna_profile"),
        media_kind: media_kind_from_str(row.get::<String, _>("media_kind").as_str()),
    }
}

fn object_from_row(row: &sqlx::sqlite::SqliteRow) -> Object {
    Object {
        object_id: row.get("object_id"),
        parent_id: row.get("parent_id"),
        ref_id: row.get("ref_id"),
        class: row.get("class"),
        name: row.get("name"),
        detail_id: row.get("detail_id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms_core::well_known;

    async fn store() -> CatalogStore {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::schema::open_or_rebuild(&dir.path().join("files.db"))
            .await
            .unwrap();
        // Keep the tempdir alive for the pool's lifetime by leaking it in
        // this helper; test processes are short-lived.
        std::mem::forget(dir);
        CatalogStore::new(pool)
    }

    #[tokio::test]
    async fn put_and_get_object_round_trips() {
        let store = store().await;
        let obj = Object {
            object_id: well_known::ROOT.to_string(),
            parent_id: "-1".to_string(),
            ref_id: None,
            class: "container.storageFolder".to_string(),
            name: "root".to_string(),
            detail_id: None,
        };
        store.put_object(&obj).await.unwrap();
        let fetched = store.get_object(well_known::ROOT).await.unwrap().unwrap();
        assert_eq!(fetched.name, "root");
    }

    #[tokio::test]
    async fn total_changes_increments_on_writes() {
        let store = store().await;
        assert_eq!(store.total_changes(), 0);
        let detail = Detail {
            title: "x".to_string(),
            ..Detail::default()
        };
        store.put_detail(&detail).await.unwrap();
        assert_eq!(store.total_changes(), 1);
    }

    #[tokio::test]
    async fn find_by_glob_matches_descendants() {
        let store = store().await;
        for id in ["1$0", "1$0$A", "1$0$A$1", "1$1"] {
            store
                .put_object(&Object {
                    object_id: id.to_string(),
                    parent_id: "1".to_string(),
                    ref_id: None,
                    class: "item.videoItem".to_string(),
                    name: id.to_string(),
                    detail_id: None,
                })
                .await
                .unwrap();
        }
        let matches = store
            .find_by_glob(&dms_core::ids::descendants_glob("1$0"), None, &[], "object_id ASC", 0, -1)
            .await
            .unwrap();
        let ids: Vec<_> = matches.iter().map(|o| o.object_id.as_str()).collect();
        assert!(ids.contains(&"1$0$A"));
        assert!(ids.contains(&"1$0$A$1"));
        assert!(!ids.contains(&"1$1"));
    }
}
