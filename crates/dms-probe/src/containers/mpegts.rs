//! MPEG-TS: PAT/PMT walker plus an Annex-B SPS reader (H.264) and an
//! MPEG-2 sequence-header reader, enough to fill in codec/profile/level/
//! resolution for the cascade.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{ProbedAudio, ProbedContainer, ProbedVideo, VideoCodec};

const PACKET_SIZE: usize = 188;
const SYNC: u8 = 0x47;

const STREAM_TYPE_MPEG2_VIDEO: u8 = 0x02;
const STREAM_TYPE_H264: u8 = 0x1b;
const STREAM_TYPE_AAC_ADTS: u8 = 0x0f;
const STREAM_TYPE_AC3: u8 = 0x81;
const STREAM_TYPE_MPEG_AUDIO: u8 = 0x03;

pub fn probe(path: &Path) -> Option<ProbedContainer> {
    let mut f = File::open(path).ok()?;
    let mut raw = Vec::new();
    f.read_to_end(&mut raw).ok()?;
    if raw.len() < PACKET_SIZE || raw[0] != SYNC {
        return None;
    }

    let mut container = ProbedContainer {
        name: "mpegts",
        ..ProbedContainer::default()
    };

    let mut pmt_pid = None;
    let mut video_pid = None;
    let mut video_type = 0u8;
    let mut audio_pid = None;
    let mut audio_type = 0u8;

    for pkt in raw.chunks(PACKET_SIZE) {
        if pkt.len() < PACKET_SIZE || pkt[0] != SYNC {
            continue;
        }
        let pid = (((pkt[1] & 0x1f) as u16) << 8) | pkt[2] as u16;
        let payload_start = pkt[1] & 0x40 != 0;
        if !payload_start {
            continue;
        }
        let adaptation = (pkt[3] >> 4) & 0x3;
        let mut offset = 4;
        if adaptation == 2 || adaptation == 3 {
            if pkt.len() <= offset {
                continue;
            }
            offset += 1 + pkt[offset] as usize;
        }
        if offset >= pkt.len() {
            continue;
        }
        let pointer = pkt[offset] as usize;
        let section_start = offset + 1 + pointer;
        if section_start >= pkt.len() {
            continue;
        }
        let section = &pkt[section_start..];

        if pid == 0 && pmt_pid.is_none() {
            pmt_pid = parse_pat(section);
        } else if Some(pid) == pmt_pid {
            if let Some((vpid, vtype, apid, atype)) = parse_pmt(section) {
                video_pid = vpid;
                video_type = vtype;
                audio_pid = apid;
                audio_type = atype;
            }
        }
    }

    if video_pid.is_none() && audio_pid.is_none() {
        return None;
    }

    if let Some(vpid) = video_pid {
        let mut video = ProbedVideo {
            codec: Some(match video_type {
                STREAM_TYPE_H264 => VideoCodec::H264,
                _ => VideoCodec::Mpeg2,
            }),
            ..ProbedVideo::default()
        };
        let es = collect_pes_payload(&raw, vpid);
        match video.codec {
            Some(VideoCodec::H264) => {
                if let Some(sps) = find_annex_b_sps(&es) {
                    crate::containers::h264::parse_sps(&sps, &mut video);
                }
            }
            _ => {
                parse_mpeg2_sequence_header(&es, &mut video);
            }
        }
        container.video = Some(video);
    }

    if let Some(_apid) = audio_pid {
        container.audio = Some(ProbedAudio {
            codec: Some(match audio_type {
                STREAM_TYPE_AC3 => super::AudioCodec::Ac3,
                STREAM_TYPE_AAC_ADTS => super::AudioCodec::Aac,
                STREAM_TYPE_MPEG_AUDIO => super::AudioCodec::Mp3,
                _ => super::AudioCodec::Other,
            }),
            ..ProbedAudio::default()
        });
    }

    Some(container)
}

fn parse_pat(section: &[u8]) -> Option<u16> {
    if section[0] != 0x00 {
        return None;
    }
    let section_len = (((section[1] & 0x0f) as usize) << 8) | section[2] as usize;
    let mut pos = 8;
    let end = 3 + section_len - 4; // minus CRC
    while pos + 4 <= end && pos + 4 <= section.len() {
        let program_num = ((section[pos] as u16) << 8) | section[pos + 1] as u16;
        let pid = (((section[pos + 2] & 0x1f) as u16) << 8) | section[pos + 3] as u16;
        if program_num != 0 {
            return Some(pid);
        }
        pos += 4;
    }
    None
}

fn parse_pmt(section: &[u8]) -> Option<(Option<u16>, u8, Option<u16>, u8)> {
    if section[0] != 0x02 {
        return None;
    }
    let section_len = (((section[1] & 0x0f) as usize) << 8) | section[2] as usize;
    let program_info_len = (((section[10] & 0x0f) as usize) << 8) | section[11] as usize;
    let mut pos = 12 + program_info_len;
    let end = 3 + section_len - 4;

    let mut video_pid = None;
    let mut video_type = 0u8;
    let mut audio_pid = None;
    let mut audio_type = 0u8;

    while pos + 5 <= end && pos + 5 <= section.len() {
        let stream_type = section[pos];
        let pid = (((section[pos + 1] & 0x1f) as u16) << 8) | section[pos + 2] as u16;
        let es_info_len = (((section[pos + 3] & 0x0f) as usize) << 8) | section[pos + 4] as usize;
        match stream_type {
            STREAM_TYPE_MPEG2_VIDEO | STREAM_TYPE_H264 if video_pid.is_none() => {
                video_pid = Some(pid);
                video_type = stream_type;
            }
            STREAM_TYPE_AAC_ADTS | STREAM_TYPE_AC3 | STREAM_TYPE_MPEG_AUDIO
                if audio_pid.is_none() =>
            {
                audio_pid = Some(pid);
                audio_type = stream_type;
            }
            _ => {}
        }
        pos += 5 + es_info_len;
    }

    Some((video_pid, video_type, audio_pid, audio_type))
}

/// Concatenate PES payload bytes for `pid` across the first handful of
/// packets; enough to reach the first SPS/sequence-header.
fn collect_pes_payload(raw: &[u8], pid: u16) -> Vec<u8> {
    let mut out = Vec::new();
    let mut packets_seen = 0;
    for pkt in raw.chunks(PACKET_SIZE) {
        if pkt.len() < PACKET_SIZE || pkt[0] != SYNC {
            continue;
        }
        let this_pid = (((pkt[1] & 0x1f) as u16) << 8) | pkt[2] as u16;
        if this_pid != pid {
            continue;
        }
        let payload_start = pkt[1] & 0x40 != 0;
        let adaptation = (pkt[3] >> 4) & 0x3;
        let mut offset = 4;
        if adaptation == 2 || adaptation == 3 {
            if pkt.len() <= offset {
                continue;
            }
            offset += 1 + pkt[offset] as usize;
        }
        if offset >= pkt.len() {
            continue;
        }
        let mut data = &pkt[offset..];
        if payload_start && data.len() > 9 && data[0..3] == [0x00, 0x00, 0x01] {
            let pes_header_len = data[8] as usize;
            let start = 9 + pes_header_len;
            if start < data.len() {
                data = &data[start..];
            }
        }
        out.extend_from_slice(data);
        packets_seen += 1;
        if out.len() > 64 * 1024 || packets_seen > 2000 {
            break;
        }
    }
    out
}

fn find_annex_b_sps(es: &[u8]) -> Option<Vec<u8>> {
    let mut i = 0;
    while i + 4 < es.len() {
        if es[i] == 0 && es[i + 1] == 0 && es[i + 2] == 1 {
            let nal_type = es[i + 3] & 0x1f;
            if nal_type == 7 {
                let start = i + 4;
                let mut end = es.len();
                for j in start..es.len().saturating_sub(2) {
                    if es[j] == 0 && es[j + 1] == 0 && (es[j + 2] == 1 || es[j + 2] == 0) {
                        end = j;
                        break;
                    }
                }
                return Some(es[start..end].to_vec());
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    None
}

fn parse_mpeg2_sequence_header(es: &[u8], video: &mut ProbedVideo) {
    let needle = [0x00, 0x00, 0x01, 0xB3];
    if let Some(pos) = es.windows(4).position(|w| w == needle) {
        let start = pos + 4;
        if start + 4 <= es.len() {
            let b = &es[start..start + 4];
            let width = ((b[0] as u32) << 4) | ((b[1] as u32) >> 4);
            let height = (((b[1] & 0x0f) as u32) << 8) | b[2] as u32;
            video.width = Some(width);
            video.height = Some(height);
        }
    }
}
