//! Magic-byte fallback for containers the cascade never assigns a DLNA
//! profile to (`avi`, `mkv`, `flv`, `mov`) plus a few common audio-only
//! containers. Produces a placeholder stream (no codec detail) purely so
//! the generic per-container MIME fallback in the probe algorithm fires.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{ProbedAudio, ProbedContainer, ProbedVideo};

pub fn probe(path: &Path) -> Option<ProbedContainer> {
    let mut f = File::open(path).ok()?;
    let mut head = [0u8; 16];
    let n = f.read(&mut head).ok()?;
    let head = &head[..n];

    if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"AVI " {
        return Some(video_only("avi"));
    }
    if head.len() >= 4 && &head[0..4] == b"\x1A\x45\xDF\xA3" {
        return Some(video_only("mkv"));
    }
    if head.len() >= 3 && &head[0..3] == b"FLV" {
        return Some(video_only("flv"));
    }
    if head.len() >= 8 && &head[4..8] == b"ftyp" {
        return Some(video_only("mov"));
    }

    if head.len() >= 3 && (&head[0..3] == b"ID3" || (head[0] == 0xFF && head[1] & 0xE0 == 0xE0)) {
        return Some(audio_only());
    }
    if head.len() >= 4 && &head[0..4] == b"fLaC" {
        return Some(audio_only());
    }
    if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WAVE" {
        return Some(audio_only());
    }
    if head.len() >= 4 && &head[0..4] == b"OggS" {
        return Some(audio_only());
    }

    None
}

fn video_only(name: &'static str) -> ProbedContainer {
    ProbedContainer {
        name,
        video: Some(ProbedVideo::default()),
        ..ProbedContainer::default()
    }
}

fn audio_only() -> ProbedContainer {
    ProbedContainer {
        name: "audio",
        audio: Some(ProbedAudio::default()),
        ..ProbedContainer::default()
    }
}
