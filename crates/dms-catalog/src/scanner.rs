//! Filesystem walk that populates the catalog: one storage-folder Object
//! per root, recursing into non-hidden directories and video files,
//! minting deterministic hex-ordinal child ids as it goes.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dms_core::{ids, well_known, MediaKind, Object};
use tracing::{debug, info, warn};

use crate::error::CatalogError;
use crate::store::CatalogStore;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files_probed: u64,
    pub files_inserted: u64,
    pub files_skipped: u64,
    pub directories_visited: u64,
}

pub struct Scanner {
    store: Arc<CatalogStore>,
    scanning: Arc<AtomicBool>,
}

/// One configured media root: a filesystem directory plus the media kinds
/// it's allowed to contribute.
pub struct Root {
    pub path: PathBuf,
    pub top_level_id: &'static str,
    pub all_view_id: &'static str,
    pub kind: MediaKind,
}

impl Scanner {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Scanner {
            store,
            scanning: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while a scan is in progress; consulted by the SOAP layer so a
    /// Browse issued mid-scan still sees a self-consistent (if partial)
    /// catalog rather than blocking.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    pub async fn scan_roots(&self, roots: &[Root]) -> Result<ScanSummary, CatalogError> {
        self.scanning.store(true, Ordering::SeqCst);
        let result = scan_roots_inner(&self.store, roots).await;
        self.scanning.store(false, Ordering::SeqCst);
        result
    }
}

async fn scan_roots_inner(store: &CatalogStore, roots: &[Root]) -> Result<ScanSummary, CatalogError> {
    ensure_well_known_containers(store).await?;

    let mut summary = ScanSummary::default();
    for root in roots {
        let name = root
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("root")
            .to_string();

        let mut ordinals: HashMap<String, u32> = HashMap::new();
        let root_object_id = mint_child(
            store,
            root.top_level_id,
            &name,
            "container.storageFolder",
            None,
            None,
            &mut ordinals,
        )
        .await?;

        walk_dir(store, &root.path, &root_object_id, root, &mut summary, &mut ordinals).await?;
    }
    Ok(summary)
}

/// Recurses into subdirectories; boxed explicitly since an `async fn`
/// cannot call itself without breaking the recursive future type.
fn walk_dir<'a>(
    store: &'a CatalogStore,
    dir: &'a Path,
    parent_id: &'a str,
    root: &'a Root,
    summary: &'a mut ScanSummary,
    ordinals: &'a mut HashMap<String, u32>,
) -> Pin<Box<dyn Future<Output = Result<(), CatalogError>> + Send + 'a>> {
    Box::pin(async move {
        summary.directories_visited += 1;

        let mut entries = match std::fs::read_dir(dir) {
            Ok(e) => e.filter_map(|e| e.ok()).collect::<Vec<_>>(),
            Err(source) => {
                warn!(path = %dir.display(), error = %source, "failed to read directory");
                return Ok(());
            }
        };

        // Locale-aware collation: case-insensitive Unicode lowercase
        // comparison with a raw-byte tiebreak, avoiding a full ICU binding
        // for what the catalog only needs to be deterministic, not
        // linguistically perfect.
        entries.sort_by(|a, b| {
            let an = a.file_name();
            let bn = b.file_name();
            let al = an.to_string_lossy().to_lowercase();
            let bl = bn.to_string_lossy().to_lowercase();
            al.cmp(&bl).then_with(|| an.cmp(&bn))
        });

        for entry in entries {
            let path = entry.path();
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };

            if file_type.is_dir() || file_type.is_symlink() {
                let child_id = mint_child(
                    store,
                    parent_id,
                    &name,
                    "container.storageFolder",
                    None,
                    None,
                    ordinals,
                )
                .await?;
                let mut child_ordinals = HashMap::new();
                walk_dir(store, &path, &child_id, root, summary, &mut child_ordinals).await?;
                continue;
            }

            if !file_type.is_file() || !has_video_extension(&path) {
                continue;
            }

            summary.files_probed += 1;
            match probe_and_insert(store, &path, &name, parent_id, root, ordinals).await {
                Ok(true) => summary.files_inserted += 1,
                Ok(false) => summary.files_skipped += 1,
                Err(source) => {
                    warn!(path = %path.display(), error = %source, "failed to probe file, skipping");
                    summary.files_skipped += 1;
                }
            }
        }

        Ok(())
    })
}

async fn probe_and_insert(
    store: &CatalogStore,
    path: &Path,
    display_name: &str,
    parent_id: &str,
    root: &Root,
    ordinals: &mut HashMap<String, u32>,
) -> Result<bool, CatalogError> {
    let probed = match dms_probe::probe(path, display_name) {
        Ok(p) => p,
        Err(source) => {
            warn!(path = %path.display(), error = %source, "probe failed to stat file");
            return Ok(false);
        }
    };

    let detail = match probed {
        dms_probe::Probed::Recognized(d) => d,
        dms_probe::Probed::Unrecognized(_) => {
            debug!(path = %path.display(), "unrecognized media, skipping");
            return Ok(false);
        }
    };

    let detail_id = store.put_detail(&detail).await?;

    let class = detail.media_kind.class_family();
    let real_object_id = mint_child(store, parent_id, display_name, class, Some(detail_id), None, ordinals).await?;

    // Virtual view under the flat "All <Kind>" container, referencing the
    // same Detail row. Carries a non-null `ref_id` pointing at the real
    // object above — it is a shortcut node, not a second original.
    let mut all_ordinals = HashMap::new();
    mint_child(
        store,
        root.all_view_id,
        display_name,
        class,
        Some(detail_id),
        Some(real_object_id),
        &mut all_ordinals,
    )
    .await?;

    pair_subtitles(store, path, detail_id).await?;

    Ok(true)
}

async fn mint_child(
    store: &CatalogStore,
    parent_id: &str,
    name: &str,
    class: &str,
    detail_id: Option<i64>,
    ref_id: Option<String>,
    ordinals: &mut HashMap<String, u32>,
) -> Result<String, CatalogError> {
    let next = match ordinals.get(parent_id) {
        Some(n) => *n + 1,
        None => {
            let existing = store.list_children(parent_id, 0, -1, "object_id ASC").await?;
            existing
                .iter()
                .filter_map(|o| ids::last_ordinal(&o.object_id))
                .max()
                .map(|m| m + 1)
                .unwrap_or(0)
        }
    };
    ordinals.insert(parent_id.to_string(), next);

    let object_id = ids::child_id(parent_id, next);
    store
        .put_object(&Object {
            object_id: object_id.clone(),
            parent_id: parent_id.to_string(),
            ref_id,
            class: class.to_string(),
            name: name.to_string(),
            detail_id,
        })
        .await?;
    Ok(object_id)
}

async fn ensure_well_known_containers(store: &CatalogStore) -> Result<(), CatalogError> {
    if store.get_object(well_known::ROOT).await?.is_some() {
        return Ok(());
    }

    info!("bootstrapping well-known containers");
    let root = Object {
        object_id: well_known::ROOT.to_string(),
        parent_id: "-1".to_string(),
        ref_id: None,
        class: "container.storageFolder".to_string(),
        name: "root".to_string(),
        detail_id: None,
    };
    store.put_object(&root).await?;

    for (id, name) in [
        (well_known::VIDEO, "Video"),
        (well_known::AUDIO, "Audio"),
        (well_known::IMAGE, "Pictures"),
    ] {
        store
            .put_object(&Object {
                object_id: id.to_string(),
                parent_id: well_known::ROOT.to_string(),
                ref_id: None,
                class: "container.storageFolder".to_string(),
                name: name.to_string(),
                detail_id: None,
            })
            .await?;
    }

    for (id, parent) in [
        (well_known::ALL_VIDEOS, well_known::VIDEO),
        (well_known::ALL_AUDIO, well_known::AUDIO),
        (well_known::ALL_IMAGES, well_known::IMAGE),
    ] {
        store
            .put_object(&Object {
                object_id: id.to_string(),
                parent_id: parent.to_string(),
                ref_id: None,
                class: "container.storageFolder".to_string(),
                name: "All".to_string(),
                detail_id: None,
            })
            .await?;
    }

    Ok(())
}

fn has_video_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("mp4" | "m4v" | "mov" | "avi" | "mkv" | "flv" | "mpg" | "mpeg" | "ts" | "m2ts"
            | "vob" | "asf" | "wmv" | "3gp")
    )
}

async fn pair_subtitles(store: &CatalogStore, video_path: &Path, detail_id: i64) -> Result<(), CatalogError> {
    for ext in ["srt", "smi"] {
        let candidate = video_path.with_extension(ext);
        if candidate.is_file() {
            sqlx::query("INSERT OR IGNORE INTO caption (detail_id, caption_path) VALUES (?, ?)")
                .bind(detail_id)
                .bind(candidate.display().to_string())
                .execute(store.pool())
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_empty_root_creates_well_known_containers() {
        let dir = tempfile::tempdir().unwrap();
        let db_dir = tempfile::tempdir().unwrap();
        let pool = crate::schema::open_or_rebuild(&db_dir.path().join("files.db"))
            .await
            .unwrap();
        let store = Arc::new(CatalogStore::new(pool));
        let scanner = Scanner::new(store.clone());

        let root = Root {
            path: dir.path().to_path_buf(),
            top_level_id: well_known::VIDEO,
            all_view_id: well_known::ALL_VIDEOS,
            kind: MediaKind::Video,
        };
        scanner.scan_roots(&[root]).await.unwrap();

        assert!(store.get_object(well_known::ROOT).await.unwrap().is_some());
        assert!(store.get_object(well_known::VIDEO).await.unwrap().is_some());
        assert!(!scanner.is_scanning());
    }

    #[tokio::test]
    async fn virtual_view_child_carries_ref_id_to_the_real_object() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::schema::open_or_rebuild(&dir.path().join("files.db")).await.unwrap();
        let store = CatalogStore::new(pool);

        let mut ordinals = HashMap::new();
        let real_id = mint_child(&store, "1", "Movie", "item.videoItem", None, None, &mut ordinals)
            .await
            .unwrap();

        let mut all_ordinals = HashMap::new();
        let virtual_id = mint_child(
            &store,
            "1$0",
            "Movie",
            "item.videoItem",
            None,
            Some(real_id.clone()),
            &mut all_ordinals,
        )
        .await
        .unwrap();

        let real_obj = store.get_object(&real_id).await.unwrap().unwrap();
        let virtual_obj = store.get_object(&virtual_id).await.unwrap().unwrap();
        assert!(!real_obj.is_virtual());
        assert!(virtual_obj.is_virtual());
        assert_eq!(virtual_obj.ref_id.as_deref(), Some(real_id.as_str()));
    }
}
