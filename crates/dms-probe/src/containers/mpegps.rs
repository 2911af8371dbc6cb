//! MPEG program stream (`.mpg`/`.mpeg`/`.vob`): pack-header walker plus the
//! same MPEG-2 sequence-header reader used for TS, since PAL/NTSC placement
//! in the cascade depends only on the decoded picture height.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{ProbedContainer, ProbedVideo, VideoCodec};

const PACK_START: [u8; 4] = [0x00, 0x00, 0x01, 0xBA];
const SEQUENCE_HEADER: [u8; 4] = [0x00, 0x00, 0x01, 0xB3];

pub fn probe(path: &Path) -> Option<ProbedContainer> {
    let mut f = File::open(path).ok()?;
    let mut head = vec![0u8; 256 * 1024];
    let n = f.read(&mut head).ok()?;
    head.truncate(n);

    if !head.windows(4).any(|w| w == PACK_START) {
        return None;
    }

    let mut container = ProbedContainer {
        name: "mpeg",
        ..ProbedContainer::default()
    };

    if let Some(pos) = head.windows(4).position(|w| w == SEQUENCE_HEADER) {
        let start = pos + 4;
        if start + 4 <= head.len() {
            let b = &head[start..start + 4];
            let width = ((b[0] as u32) << 4) | ((b[1] as u32) >> 4);
            let height = (((b[1] & 0x0f) as u32) << 8) | b[2] as u32;
            container.video = Some(ProbedVideo {
                codec: Some(VideoCodec::Mpeg2),
                width: Some(width),
                height: Some(height),
                ..ProbedVideo::default()
            });
        }
    }

    Some(container)
}
