//! The DLNA profile cascade: container, then video codec, then audio
//! profile, then a handful of numeric thresholds. Expressed as a small set
//! of data-driven rules rather than one nested conditional, so each rule's
//! applicability can be read (and tested) on its own.

use dms_core::AudioProfile;

use crate::containers::{ProbedContainer, ProbedVideo, VideoCodec};
use crate::ts_framing::Framing;

pub struct CascadeRule {
    pub mime: String,
    pub profile: Option<String>,
}

fn audio_suffix(profile: AudioProfile) -> Option<&'static str> {
    profile.profile_suffix()
}

pub fn resolve(
    container: &ProbedContainer,
    video: &ProbedVideo,
    audio_profile: AudioProfile,
    ts_framing: Option<Framing>,
) -> CascadeRule {
    match container.name {
        "mpeg" => resolve_mpeg_ps(video),
        "mpegts" => resolve_mpegts(video, audio_profile, ts_framing),
        "mp4" | "mov" => resolve_mp4(container, video, audio_profile),
        "asf" => resolve_asf(video),
        other => CascadeRule {
            mime: generic_mime(other),
            profile: None,
        },
    }
}

fn resolve_mpeg_ps(video: &ProbedVideo) -> CascadeRule {
    let pal = matches!(video.height, Some(576) | Some(288));
    CascadeRule {
        mime: "video/mpeg".to_string(),
        profile: Some(if pal { "MPEG_PS_PAL" } else { "MPEG_PS_NTSC" }.to_string()),
    }
}

fn resolve_mpegts(
    video: &ProbedVideo,
    audio_profile: AudioProfile,
    ts_framing: Option<Framing>,
) -> CascadeRule {
    let (ts_suffix, mime) = match ts_framing {
        Some(Framing::Dlna192 { timestamp_present: true }) => {
            ("_T", "video/vnd.dlna.mpeg-tts")
        }
        Some(Framing::Dlna192 { timestamp_present: false }) => ("", "video/vnd.dlna.mpeg-tts"),
        Some(Framing::Raw188) => ("_ISO", "video/mpeg"),
        None => ("", "video/mpeg"),
    };

    let is_hd = matches!((video.width, video.height), (Some(w), Some(h)) if w >= 1280 && h >= 720);

    let base = match video.codec {
        Some(VideoCodec::Mpeg2) => {
            if is_hd {
                format!("MPEG_TS_HD_NA{ts_suffix}")
            } else {
                let region = if matches!(video.height, Some(576) | Some(288)) { "EU" } else { "NA" };
                format!("MPEG_TS_SD_{region}{ts_suffix}")
            }
        }
        Some(VideoCodec::H264) => {
            let profile = video.profile.as_deref().unwrap_or("");
            let small = matches!((video.width, video.height), (Some(w), Some(h)) if w <= 352 && h <= 288);
            if profile == "Baseline" && small {
                format!("AVC_TS_BL_CIF30{ts_suffix}")
            } else if profile == "Main" && !is_hd {
                format!("AVC_TS_MP_SD{ts_suffix}")
            } else if profile == "High" && is_hd {
                format!("AVC_TS_HP_HD{ts_suffix}")
            } else {
                format!("AVC_TS_MP_SD{ts_suffix}")
            }
        }
        _ => return CascadeRule { mime: mime.to_string(), profile: None },
    };

    let profile = match audio_suffix(audio_profile) {
        Some(suffix) => format!("{base}_{suffix}"),
        None => base,
    };

    CascadeRule {
        mime: mime.to_string(),
        profile: Some(profile),
    }
}

fn resolve_mp4(
    container: &ProbedContainer,
    video: &ProbedVideo,
    audio_profile: AudioProfile,
) -> CascadeRule {
    let mime = generic_mime(container.name);

    let profile = match video.codec {
        Some(VideoCodec::H264) => {
            let base = match video.profile.as_deref() {
                Some("Baseline") => "AVC_MP4_BL",
                Some("Main") => "AVC_MP4_MP",
                Some("High") => "AVC_MP4_HP",
                _ => "AVC_MP4_BL",
            };
            let is_hd = matches!((video.width, video.height), (Some(w), Some(h)) if w >= 1280 && h >= 720);
            let tier = if is_hd { "HD" } else { "SD" };
            match audio_suffix(audio_profile) {
                Some(suffix) => Some(format!("{base}_{tier}_{suffix}")),
                None => Some(format!("{base}_{tier}")),
            }
        }
        Some(VideoCodec::Mpeg4Part2) => Some("MPEG4_P2_3GPP_SP_L0B".to_string()),
        _ => None,
    };

    CascadeRule { mime, profile }
}

fn resolve_asf(video: &ProbedVideo) -> CascadeRule {
    let tier = match (video.width, video.height) {
        (Some(w), Some(h)) if w >= 1280 && h >= 720 => "HIGH",
        (Some(w), Some(h)) if w >= 720 && h >= 480 => "MED",
        (Some(w), _) if w > 176 => "SPML",
        _ => "SPLL",
    };
    CascadeRule {
        mime: "video/x-ms-wmv".to_string(),
        profile: Some(format!("WMV{tier}_BASE")),
    }
}

/// Generic per-container MIME used both as the mp4/mov discriminator and
/// as the fallback when no profile rule matched.
pub fn generic_mime(container_name: &str) -> String {
    match container_name {
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "flv" => "video/x-flv",
        "mpeg" | "mpegts" => "video/mpeg",
        "asf" => "video/x-ms-wmv",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpeg_ps_pal_vs_ntsc() {
        let pal = resolve_mpeg_ps(&ProbedVideo {
            height: Some(576),
            ..ProbedVideo::default()
        });
        assert_eq!(pal.profile.as_deref(), Some("MPEG_PS_PAL"));

        let ntsc = resolve_mpeg_ps(&ProbedVideo {
            height: Some(480),
            ..ProbedVideo::default()
        });
        assert_eq!(ntsc.profile.as_deref(), Some("MPEG_PS_NTSC"));
    }

    #[test]
    fn mpegts_hd_mpeg2_gets_na_suffix() {
        let video = ProbedVideo {
            codec: Some(VideoCodec::Mpeg2),
            width: Some(1920),
            height: Some(1080),
            ..ProbedVideo::default()
        };
        let rule = resolve_mpegts(&video, AudioProfile::Unknown, None);
        assert!(rule.profile.unwrap().starts_with("MPEG_TS_HD_NA"));
    }

    #[test]
    fn mpegts_sd_mpeg2_defaults_to_na() {
        let video = ProbedVideo {
            codec: Some(VideoCodec::Mpeg2),
            width: Some(720),
            height: Some(480),
            ..ProbedVideo::default()
        };
        let rule = resolve_mpegts(
            &video,
            AudioProfile::Unknown,
            Some(Framing::Dlna192 { timestamp_present: true }),
        );
        assert_eq!(rule.profile.as_deref(), Some("MPEG_TS_SD_NA_T"));
    }

    #[test]
    fn mpegts_sd_mpeg2_pal_height_gets_eu() {
        let video = ProbedVideo {
            codec: Some(VideoCodec::Mpeg2),
            width: Some(720),
            height: Some(576),
            ..ProbedVideo::default()
        };
        let rule = resolve_mpegts(&video, AudioProfile::Unknown, None);
        assert_eq!(rule.profile.as_deref(), Some("MPEG_TS_SD_EU"));
    }

    #[test]
    fn generic_mime_has_no_profile_for_unowned_container() {
        let rule = resolve(
            &ProbedContainer {
                name: "mkv",
                ..ProbedContainer::default()
            },
            &ProbedVideo::default(),
            AudioProfile::Unknown,
            None,
        );
        assert_eq!(rule.mime, "video/x-matroska");
        assert!(rule.profile.is_none());
    }
}
