//! Per-container-family demuxers.
//!
//! No single crate speaks every legacy container this server has to serve,
//! so each family gets its own thin byte-level reader. Only the containers
//! the profile cascade actually assigns profiles to (mp4, mpegts, mpeg-ps,
//! asf) get full stream enumeration; everything else is magic-sniffed for a
//! generic MIME type only, matching the cascade table.

mod asf;
pub(crate) mod h264;
mod mp4;
mod mpegps;
mod mpegts;
mod sniff;

use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    Mpeg2,
    H264,
    Mpeg4Part2,
    Wmv3Vc1,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioCodec {
    Mp3,
    Ac3,
    Aac,
    WmaV1V2,
    WmaPro,
    Mp2,
    Pcm,
    Amr,
    Other,
}

#[derive(Clone, Debug, Default)]
pub struct ProbedVideo {
    pub codec: Option<VideoCodec>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub profile: Option<String>,
    pub level: Option<String>,
    pub fps: Option<f32>,
    pub interlaced: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ProbedAudio {
    pub codec: Option<AudioCodec>,
    pub channels: Option<i32>,
    pub sample_rate_hz: Option<i32>,
    pub bitrate_bps: Option<i64>,
    /// Raw codec-specific extradata (e.g. the AAC `AudioSpecificConfig`),
    /// used by [`crate::audio::classify`] to read the object-type byte.
    pub extradata: Vec<u8>,
}

/// A demuxed container: at most one video stream and one audio stream, the
/// first of each kind found, matching the contract's "pick the first video
/// stream that is not a thumbnail and the first audio stream".
#[derive(Clone, Debug, Default)]
pub struct ProbedContainer {
    pub name: &'static str,
    pub duration_ms: Option<i64>,
    pub bitrate_bps: Option<i64>,
    pub video: Option<ProbedVideo>,
    pub audio: Option<ProbedAudio>,
}

impl ProbedContainer {
    pub fn video_stream(&self) -> Option<&ProbedVideo> {
        self.video.as_ref()
    }

    pub fn audio_stream(&self) -> Option<&ProbedAudio> {
        self.audio.as_ref()
    }
}

/// Open `path`, dispatching to a family-specific reader by extension, then
/// falling back to a magic-byte sniff so a misnamed file is still handled.
pub fn open(path: &Path) -> Option<ProbedContainer> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let by_ext = match ext.as_str() {
        "mp4" | "m4v" | "3gp" | "mov" | "m4a" => mp4::probe(path),
        "ts" | "m2ts" | "mts" => mpegts::probe(path),
        "mpg" | "mpeg" | "vob" => mpegps::probe(path),
        "asf" | "wmv" | "wma" => asf::probe(path),
        _ => None,
    };
    by_ext.or_else(|| sniff::probe(path))
}
