use serde::{Deserialize, Serialize};

/// The coarse media family a physical file (or synthetic folder) belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Nfo,
    #[default]
    None,
}

impl MediaKind {
    pub fn class_family(&self) -> &'static str {
        match self {
            MediaKind::Video => "item.videoItem",
            MediaKind::Audio => "item.audioItem",
            MediaKind::Image => "item.imageItem",
            MediaKind::Nfo | MediaKind::None => "item",
        }
    }
}

/// One row per physical media file or synthetic folder. Never mutated after
/// insert; a rescan deletes and reinserts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub id: i64,
    pub path: Option<String>,
    pub size: i64,
    pub modified_at: i64,
    pub title: String,
    pub creator: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    pub date: Option<String>,
    pub duration_ms: Option<i64>,
    pub channels: Option<i32>,
    pub sample_rate_hz: Option<i32>,
    pub bitrate_bps: Option<i64>,
    pub resolution: Option<String>,
    pub mime: Option<String>,
    pub dlna_profile: Option<String>,
    pub media_kind: MediaKind,
}

impl Detail {
    /// The `WxH` resolution string, if both dimensions are known.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some(format!("{width}x{height}"));
        self
    }

    pub fn resolution_wh(&self) -> Option<(u32, u32)> {
        let (w, h) = self.resolution.as_ref()?.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    }
}

/// One row per DIDL-Lite node: a container or an item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub object_id: String,
    pub parent_id: String,
    pub ref_id: Option<String>,
    pub class: String,
    pub name: String,
    pub detail_id: Option<i64>,
}

impl Object {
    pub fn is_container(&self) -> bool {
        self.class.starts_with("container")
    }

    pub fn is_virtual(&self) -> bool {
        self.ref_id.is_some()
    }
}

/// Well-known top-level container ids, mirroring minidlna's fixed roots.
pub mod well_known {
    pub const ROOT: &str = "0";
    pub const VIDEO: &str = "1";
    pub const AUDIO: &str = "2";
    pub const IMAGE: &str = "3";
    pub const ALL_VIDEOS: &str = "1$0";
    pub const ALL_AUDIO: &str = "2$0";
    pub const ALL_IMAGES: &str = "3$0";
}

/// A mapping from a Detail's `detail_id` to its sidecar subtitle file path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub detail_id: i64,
    pub caption_path: String,
}

/// Audio codec profile classification used by the DLNA profile cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioProfile {
    Mp3,
    Ac3,
    WmaBase,
    WmaFull,
    WmaPro,
    Mp2,
    Pcm,
    Aac,
    AacMult5,
    Amr,
    Unknown,
}

impl AudioProfile {
    /// The suffix the profile cascade appends to an AVC/MP4/TS video profile string.
    pub fn profile_suffix(&self) -> Option<&'static str> {
        match self {
            AudioProfile::Mp3 => Some("MPEG1_L3"),
            AudioProfile::Ac3 => Some("AC3"),
            AudioProfile::Aac | AudioProfile::AacMult5 => Some("AAC_MULT5"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_round_trips() {
        let d = Detail::default().with_resolution(1920, 1080);
        assert_eq!(d.resolution.as_deref(), Some("1920x1080"));
        assert_eq!(d.resolution_wh(), Some((1920, 1080)));
    }

    #[test]
    fn class_family_matches_media_kind() {
        assert_eq!(MediaKind::Video.class_family(), "item.videoItem");
        assert_eq!(MediaKind::Audio.class_family(), "item.audioItem");
    }
}
