//! ASF (`.asf`/`.wmv`/`.wma`): GUID-object walker down to the Stream
//! Properties Object, which carries the per-stream codec and, for video,
//! the frame dimensions.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::{AudioCodec, ProbedAudio, ProbedContainer, ProbedVideo, VideoCodec};

const HEADER_OBJECT: [u8; 16] = guid(0x75B22630, 0x668E, 0x11CF, [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C]);
const FILE_PROPERTIES: [u8; 16] = guid(0x8CABDCA1, 0xA947, 0x11CF, [0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65]);
const STREAM_PROPERTIES: [u8; 16] = guid(0xB7DC0791, 0xA9B7, 0x11CF, [0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65]);
const AUDIO_MEDIA: [u8; 16] = guid(0xF8699E40, 0x5B4D, 0x11CF, [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B]);
const VIDEO_MEDIA: [u8; 16] = guid(0xBC19EFC0, 0x5B4D, 0x11CF, [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B]);

/// Build a little-endian ASF GUID byte layout from its canonical fields.
const fn guid(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> [u8; 16] {
    let d1 = d1.to_le_bytes();
    let d2 = d2.to_le_bytes();
    let d3 = d3.to_le_bytes();
    [
        d1[0], d1[1], d1[2], d1[3], d2[0], d2[1], d3[0], d3[1], d4[0], d4[1], d4[2], d4[3], d4[4],
        d4[5], d4[6], d4[7],
    ]
}

pub fn probe(path: &Path) -> Option<ProbedContainer> {
    let mut f = File::open(path).ok()?;
    let mut guid_buf = [0u8; 16];
    f.read_exact(&mut guid_buf).ok()?;
    if guid_buf != HEADER_OBJECT {
        return None;
    }

    let mut size_buf = [0u8; 8];
    f.read_exact(&mut size_buf).ok()?;
    let header_size = u64::from_le_bytes(size_buf);

    let mut count_buf = [0u8; 6];
    f.read_exact(&mut count_buf).ok()?;
    let object_count = u32::from_le_bytes(count_buf[0..4].try_into().unwrap());

    let mut container = ProbedContainer {
        name: "asf",
        ..ProbedContainer::default()
    };

    let mut pos = 30u64;
    for _ in 0..object_count {
        if pos + 24 > header_size {
            break;
        }
        f.seek(SeekFrom::Start(pos)).ok()?;
        let mut obj_guid = [0u8; 16];
        let mut obj_size_buf = [0u8; 8];
        if f.read_exact(&mut obj_guid).is_err() || f.read_exact(&mut obj_size_buf).is_err() {
            break;
        }
        let obj_size = u64::from_le_bytes(obj_size_buf);
        if obj_size < 24 {
            break;
        }

        if obj_guid == FILE_PROPERTIES {
            let mut body = vec![0u8; (obj_size - 24).min(64) as usize];
            if f.read_exact(&mut body).is_ok() && body.len() >= 40 {
                let play_duration_100ns = u64::from_le_bytes(body[16..24].try_into().unwrap());
                container.duration_ms = Some((play_duration_100ns / 10_000) as i64);
                let max_bitrate = u32::from_le_bytes(body[60 - 24..64 - 24].try_into().unwrap_or([0; 4]));
                if max_bitrate > 0 {
                    container.bitrate_bps = Some(max_bitrate as i64);
                }
            }
        } else if obj_guid == STREAM_PROPERTIES {
            let mut body = vec![0u8; (obj_size - 24).min(128) as usize];
            if f.read_exact(&mut body).is_ok() && body.len() >= 54 {
                let stream_type: [u8; 16] = body[0..16].try_into().unwrap();
                if stream_type == VIDEO_MEDIA && container.video.is_none() {
                    // type-specific data starts after the 54-byte fixed
                    // prefix; the BITMAPINFOHEADER biWidth/biHeight follow.
                    if body.len() >= 54 + 8 {
                        let w = i32::from_le_bytes(body[54..58].try_into().unwrap());
                        let h = i32::from_le_bytes(body[58..62].try_into().unwrap());
                        container.video = Some(ProbedVideo {
                            codec: Some(VideoCodec::Wmv3Vc1),
                            width: Some(w.unsigned_abs()),
                            height: Some(h.unsigned_abs()),
                            ..ProbedVideo::default()
                        });
                    }
                } else if stream_type == AUDIO_MEDIA && container.audio.is_none() {
                    if body.len() >= 54 + 16 {
                        let codec_id = u16::from_le_bytes(body[54..56].try_into().unwrap());
                        let channels = u16::from_le_bytes(body[56..58].try_into().unwrap());
                        let sample_rate = u32::from_le_bytes(body[58..62].try_into().unwrap());
                        let avg_bytes_per_sec = u32::from_le_bytes(body[62..66].try_into().unwrap());
                        container.audio = Some(ProbedAudio {
                            codec: Some(match codec_id {
                                0x0161 => AudioCodec::WmaV1V2,
                                0x0162 => AudioCodec::WmaV1V2,
                                0x0163 => AudioCodec::WmaPro,
                                _ => AudioCodec::Other,
                            }),
                            channels: Some(channels as i32),
                            sample_rate_hz: Some(sample_rate as i32),
                            bitrate_bps: Some(avg_bytes_per_sec as i64 * 8),
                            extradata: Vec::new(),
                        });
                    }
                }
            }
        }

        pos += obj_size;
    }

    Some(container)
}
