//! Layered configuration: built-in defaults, overridden by an optional TOML
//! file, overridden in turn by CLI flags/environment variables — the same
//! shape as the teacher's settings repository, just sourced from a file
//! instead of a sqlite-backed key/value table.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use dms_core::well_known;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MediaRootConfig {
    pub path: PathBuf,
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct FileConfig {
    port: u16,
    friendly_name: String,
    db_path: Option<PathBuf>,
    media_roots: Vec<MediaRootConfig>,
    disallow_wide_links: bool,
    strict_dlna: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            port: 8200,
            friendly_name: "dms".to_string(),
            db_path: None,
            media_roots: Vec::new(),
            disallow_wide_links: true,
            strict_dlna: false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "A DLNA/UPnP media server")]
pub struct Args {
    /// Path to a TOML config file.
    #[arg(long, env = "DMS_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "DMS_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "DMS_FRIENDLY_NAME")]
    pub friendly_name: Option<String>,

    #[arg(long, env = "DMS_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Repeatable `kind:path`, e.g. `--media-root video:/srv/movies`.
    #[arg(long = "media-root")]
    pub media_roots: Vec<String>,

    #[arg(long)]
    pub allow_wide_links: bool,

    #[arg(long)]
    pub strict_dlna: bool,
}

pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub friendly_name: String,
    pub db_path: PathBuf,
    pub media_roots: Vec<ResolvedRoot>,
    pub disallow_wide_links: bool,
    pub strict_dlna: bool,
}

pub struct ResolvedRoot {
    pub path: PathBuf,
    pub top_level_id: &'static str,
    pub all_view_id: &'static str,
    pub kind: dms_core::MediaKind,
}

impl ServerConfig {
    pub fn load(args: Args) -> anyhow::Result<Self> {
        let mut file_cfg = match &args.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
                toml::from_str(&text)?
            }
            None => FileConfig::default(),
        };

        if let Some(port) = args.port {
            file_cfg.port = port;
        }
        if let Some(name) = args.friendly_name {
            file_cfg.friendly_name = name;
        }
        if let Some(db) = args.db_path {
            file_cfg.db_path = Some(db);
        }
        if args.allow_wide_links {
            file_cfg.disallow_wide_links = false;
        }
        if args.strict_dlna {
            file_cfg.strict_dlna = true;
        }
        for spec in &args.media_roots {
            let (kind, path) = spec
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("--media-root must be kind:path, got {spec:?}"))?;
            file_cfg.media_roots.push(MediaRootConfig {
                path: PathBuf::from(path),
                kind: kind.to_string(),
            });
        }

        let db_path = file_cfg.db_path.unwrap_or_else(default_db_path);
        let media_roots = file_cfg
            .media_roots
            .into_iter()
            .map(resolve_root)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(ServerConfig {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], file_cfg.port)),
            friendly_name: file_cfg.friendly_name,
            db_path,
            media_roots,
            disallow_wide_links: file_cfg.disallow_wide_links,
            strict_dlna: file_cfg.strict_dlna,
        })
    }
}

fn resolve_root(cfg: MediaRootConfig) -> anyhow::Result<ResolvedRoot> {
    let (top_level_id, all_view_id, kind) = match cfg.kind.as_str() {
        "video" => (well_known::VIDEO, well_known::ALL_VIDEOS, dms_core::MediaKind::Video),
        "audio" => (well_known::AUDIO, well_known::ALL_AUDIO, dms_core::MediaKind::Audio),
        "image" => (well_known::IMAGE, well_known::ALL_IMAGES, dms_core::MediaKind::Image),
        other => anyhow::bail!("unknown media root kind {other:?}, expected video/audio/image"),
    };
    Ok(ResolvedRoot {
        path: cfg.path,
        top_level_id,
        all_view_id,
        kind,
    })
}

fn default_db_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dms")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_kinds() {
        let root = resolve_root(MediaRootConfig {
            path: PathBuf::from("/movies"),
            kind: "video".to_string(),
        })
        .unwrap();
        assert_eq!(root.top_level_id, well_known::VIDEO);
    }

    #[test]
    fn rejects_unknown_kind() {
        let result = resolve_root(MediaRootConfig {
            path: PathBuf::from("/x"),
            kind: "subtitles".to_string(),
        });
        assert!(result.is_err());
    }
}
