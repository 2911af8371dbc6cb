//! Turns a filesystem path into a [`dms_core::Detail`]: container sniffing,
//! stream enumeration, audio-profile classification and DLNA profile
//! assignment, with `.nfo` sidecar overrides.

pub mod audio;
pub mod cascade;
pub mod containers;
pub mod nfo;
pub mod ts_framing;

use std::path::Path;
use std::time::UNIX_EPOCH;

use chrono::{Local, TimeZone};
use dms_core::{Detail, MediaKind};
use tracing::warn;

pub use cascade::CascadeRule;
pub use containers::{ProbedAudio, ProbedContainer, ProbedVideo};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("cannot stat {path}: {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The outcome of probing one file. `Unrecognized` is not an error: it is
/// the documented result for files whose container can't be opened or that
/// carry no video/audio stream at all.
pub enum Probed {
    Recognized(Detail),
    Unrecognized(Detail),
}

impl Probed {
    pub fn into_detail(self) -> Detail {
        match self {
            Probed::Recognized(d) | Probed::Unrecognized(d) => d,
        }
    }
}

/// Probe a single file. `display_name` is the name shown to clients absent
/// better metadata (normally the file's base name).
pub fn probe(path: &Path, display_name: &str) -> Result<Probed, ProbeError> {
    let meta = std::fs::metadata(path).map_err(|source| ProbeError::Stat {
        path: path.display().to_string(),
        source,
    })?;

    let mut detail = Detail {
        path: Some(path.display().to_string()),
        size: meta.len() as i64,
        modified_at: meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        title: strip_ext(display_name),
        ..Detail::default()
    };

    let kind = classify_by_extension(path);
    let probed = match kind {
        MediaKind::Video => probe_video(path, &mut detail),
        MediaKind::Audio => probe_audio(path, &mut detail),
        MediaKind::Image => probe_image(path, &mut detail),
        MediaKind::Nfo | MediaKind::None => false,
    };
    detail.media_kind = if probed { kind } else { MediaKind::None };

    if let Some(nfo) = nfo::find_sidecar(path) {
        if let Ok(overrides) = nfo::parse(&nfo) {
            overrides.apply(&mut detail);
        } else {
            warn!(path = %nfo.display(), "failed to parse .nfo sidecar");
        }
    }

    fill_defaults(&mut detail, meta.modified().ok());

    if probed {
        Ok(Probed::Recognized(detail))
    } else {
        Ok(Probed::Unrecognized(detail))
    }
}

fn classify_by_extension(path: &Path) -> MediaKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "mp4" | "m4v" | "mov" | "avi" | "mkv" | "flv" | "mpg" | "mpeg" | "ts" | "m2ts" | "vob"
        | "asf" | "wmv" | "3gp" => MediaKind::Video,
        "mp3" | "flac" | "wav" | "ogg" | "wma" | "m4a" | "aac" | "ac3" => MediaKind::Audio,
        "jpg" | "jpeg" | "png" | "gif" | "bmp" => MediaKind::Image,
        "nfo" => MediaKind::Nfo,
        _ => MediaKind::None,
    }
}

fn probe_video(path: &Path, detail: &mut Detail) -> bool {
    let container = match containers::open(path) {
        Some(c) => c,
        None => {
            warn!(path = %path.display(), "failed to open container");
            return false;
        }
    };

    let video = match container.video_stream() {
        Some(v) => v,
        None => return false,
    };

    if let (Some(w), Some(h)) = (video.width, video.height) {
        detail.resolution = Some(format!("{w}x{h}"));
    }
    detail.duration_ms = container.duration_ms;
    detail.bitrate_bps = container.bitrate_bps.filter(|b| *b > 8).map(|b| b / 8);

    let audio = container.audio_stream();
    let audio_profile = audio
        .map(|a| audio::classify(a))
        .unwrap_or(dms_core::AudioProfile::Unknown);

    let ts_framing = if container.name == "mpegts" {
        std::fs::File::open(path)
            .ok()
            .and_then(|mut f| ts_framing::detect(&mut f).ok())
    } else {
        None
    };

    let rule = cascade::resolve(&container, &video, audio_profile, ts_framing);
    detail.mime = Some(rule.mime.clone());
    detail.dlna_profile = rule.profile;

    true
}

fn probe_audio(path: &Path, detail: &mut Detail) -> bool {
    let container = match containers::open(path) {
        Some(c) => c,
        None => return false,
    };
    let audio = match container.audio_stream() {
        Some(a) => a,
        None => return false,
    };
    detail.duration_ms = container.duration_ms;
    detail.bitrate_bps = container.bitrate_bps.filter(|b| *b > 8).map(|b| b / 8);
    detail.channels = audio.channels;
    detail.sample_rate_hz = audio.sample_rate_hz;

    let profile = audio::classify(&audio);
    let (mime, dlna) = audio::mime_and_profile(&container, profile, &audio);
    detail.mime = Some(mime);
    detail.dlna_profile = dlna;
    true
}

fn probe_image(path: &Path, detail: &mut Detail) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    detail.mime = Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => return false,
    }.to_string());
    true
}

fn strip_ext(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((base, _ext)) if !base.is_empty() => base.to_string(),
        _ => name.to_string(),
    }
}

fn fill_defaults(detail: &mut Detail, modified: Option<std::time::SystemTime>) {
    if detail.date.is_none() {
        if let Some(m) = modified {
            if let Ok(secs) = m.duration_since(UNIX_EPOCH) {
                if let Some(dt) = Local.timestamp_opt(secs.as_secs() as i64, 0).single() {
                    detail.date = Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_ext_keeps_dotfiles_without_base() {
        assert_eq!(strip_ext(".hidden"), ".hidden");
        assert_eq!(strip_ext("movie.mkv"), "movie");
        assert_eq!(strip_ext("no_extension"), "no_extension");
    }

    #[test]
    fn classify_by_extension_covers_common_cases() {
        assert_eq!(classify_by_extension(Path::new("a.mp4")), MediaKind::Video);
        assert_eq!(classify_by_extension(Path::new("a.mp3")), MediaKind::Audio);
        assert_eq!(classify_by_extension(Path::new("a.jpg")), MediaKind::Image);
        assert_eq!(classify_by_extension(Path::new("a.txt")), MediaKind::None);
    }
}
