//! ISO-BMFF (`mp4`, `m4v`, `3gp`, `mov`) box walker.
//!
//! Walks `ftyp/moov/mvhd/trak/tkhd/mdia/.../stbl/stsd` far enough to pull
//! dimensions, timescale/duration, and the sample entry fourcc (`avc1`,
//! `mp4v`, `mp4a`) plus its `avcC`/`esds` extradata box. Good enough to
//! drive the profile cascade; it does not decode sample tables.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::{AudioCodec, ProbedAudio, ProbedContainer, ProbedVideo, VideoCodec};

struct Reader {
    f: File,
    len: u64,
}

pub fn probe(path: &Path) -> Option<ProbedContainer> {
    let f = File::open(path).ok()?;
    let len = f.metadata().ok()?.len();
    let mut r = Reader { f, len };

    let mut container = ProbedContainer {
        name: if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("mov"))
            .unwrap_or(false)
        {
            "mov"
        } else {
            "mp4"
        },
        ..ProbedContainer::default()
    };

    // Require a recognizable top-level box before claiming this is ISO-BMFF.
    let top = r.peek_fourcc(0)?;
    if !matches!(&top[..], b"ftyp" | b"moov" | b"free" | b"mdat" | b"wide") {
        return None;
    }

    let len = r.len;
    walk_boxes(&mut r, 0, len, &mut container, 0);
    Some(container)
}

fn walk_boxes(r: &mut Reader, start: u64, end: u64, c: &mut ProbedContainer, depth: u32) {
    if depth > 8 {
        return;
    }
    let mut pos = start;
    while pos + 8 <= end {
        let (size, fourcc, header_len) = match r.read_box_header(pos) {
            Some(v) => v,
            None => return,
        };
        if size < header_len {
            return;
        }
        let box_end = (pos + size).min(end);

        match &fourcc[..] {
            b"moov" | b"trak" | b"mdia" | b"minf" | b"stbl" => {
                walk_boxes(r, pos + header_len, box_end, c, depth + 1);
            }
            b"mvhd" => parse_mvhd(r, pos + header_len, c),
            b"tkhd" => parse_tkhd(r, pos + header_len, c),
            b"stsd" => parse_stsd(r, pos + header_len, box_end, c),
            _ => {}
        }

        if size == 0 {
            return;
        }
        pos += size;
    }
}

fn parse_mvhd(r: &mut Reader, off: u64, c: &mut ProbedContainer) {
    let mut buf = [0u8; 20];
    if r.read_at(off, &mut buf).is_none() {
        return;
    }
    let version = buf[0];
    let (timescale, duration) = if version == 1 {
        // 64-bit variant: skip creation/modification (8+8), then 4-byte
        // timescale, 8-byte duration.
        let mut wide = [0u8; 20];
        if r.read_at(off + 16, &mut wide).is_none() {
            return;
        }
        let ts = u32::from_be_bytes(wide[0..4].try_into().unwrap());
        let dur = u64::from_be_bytes(wide[4..12].try_into().unwrap());
        (ts, dur)
    } else {
        let ts = u32::from_be_bytes(buf[12..16].try_into().unwrap());
        let dur = u32::from_be_bytes(buf[16..20].try_into().unwrap()) as u64;
        (ts, dur)
    };
    if timescale > 0 {
        c.duration_ms = Some((duration * 1000 / timescale as u64) as i64);
    }
}

fn parse_tkhd(r: &mut Reader, off: u64, c: &mut ProbedContainer) {
    // width/height are the last two 32-bit fixed-point (16.16) fields of
    // tkhd, at a fixed offset depending on version.
    let version_buf = match r.read_byte(off) {
        Some(b) => b,
        None => return,
    };
    let wh_off = if version_buf == 1 { off + 96 } else { off + 84 };
    let mut buf = [0u8; 8];
    if r.read_at(wh_off, &mut buf).is_none() {
        return;
    }
    let width = u32::from_be_bytes(buf[0..4].try_into().unwrap()) >> 16;
    let height = u32::from_be_bytes(buf[4..8].try_into().unwrap()) >> 16;
    if width > 0 && height > 0 {
        let video = c.video.get_or_insert_with(ProbedVideo::default);
        if video.width.is_none() {
            video.width = Some(width);
            video.height = Some(height);
        }
    }
}

fn parse_stsd(r: &mut Reader, off: u64, end: u64, c: &mut ProbedContainer) {
    // full box header (version+flags) + entry_count
    let mut hdr = [0u8; 8];
    if r.read_at(off, &mut hdr).is_none() {
        return;
    }
    let entry_off = off + 8;
    if entry_off + 8 > end {
        return;
    }
    let (entry_size, fourcc, entry_header_len) = match r.read_box_header(entry_off) {
        Some(v) => v,
        None => return,
    };

    match &fourcc[..] {
        b"avc1" | b"avc3" => {
            let video = c.video.get_or_insert_with(ProbedVideo::default);
            video.codec = Some(VideoCodec::H264);
            parse_avcc_profile(r, entry_off + entry_header_len, (entry_off + entry_size).min(end), video);
        }
        b"mp4v" => {
            let video = c.video.get_or_insert_with(ProbedVideo::default);
            video.codec = Some(VideoCodec::Mpeg4Part2);
        }
        b"mp4a" => {
            let audio = c.audio.get_or_insert_with(ProbedAudio::default);
            audio.codec = Some(AudioCodec::Aac);
            parse_esds_extradata(r, entry_off + entry_header_len, (entry_off + entry_size).min(end), audio);
        }
        _ => {}
    }
}

fn parse_avcc_profile(r: &mut Reader, start: u64, end: u64, video: &mut ProbedVideo) {
    let mut pos = start;
    while pos + 8 <= end {
        let (size, fourcc, header_len) = match r.read_box_header(pos) {
            Some(v) => v,
            None => return,
        };
        if fourcc == *b"avcC" {
            let mut cfg = [0u8; 4];
            if r.read_at(pos + header_len, &mut cfg).is_some() {
                let profile_idc = cfg[1];
                let level_idc = cfg[3];
                video.profile = Some(match profile_idc {
                    66 => "Baseline".to_string(),
                    77 => "Main".to_string(),
                    100 => "High".to_string(),
                    p => format!("0x{p:02x}"),
                });
                video.level = Some(format!("{}", level_idc as f32 / 10.0));
            }
            return;
        }
        if size == 0 {
            return;
        }
        pos += size;
    }
}

fn parse_esds_extradata(r: &mut Reader, start: u64, end: u64, audio: &mut ProbedAudio) {
    let mut pos = start;
    while pos + 8 <= end {
        let (size, fourcc, header_len) = match r.read_box_header(pos) {
            Some(v) => v,
            None => return,
        };
        if fourcc == *b"esds" {
            let body_len = (size.min(end - pos) - header_len) as usize;
            let mut body = vec![0u8; body_len.min(4096)];
            if r.read_at(pos + header_len, &mut body).is_some() {
                // Heuristic: the AudioSpecificConfig is the tail two bytes
                // of a typical esds descriptor chain. A full MPEG-4
                // descriptor parser is overkill for profile classification.
                if body.len() >= 2 {
                    audio.extradata = body[body.len() - 2..].to_vec();
                }
            }
            return;
        }
        if size == 0 {
            return;
        }
        pos += size;
    }
}

impl Reader {
    fn read_at(&mut self, off: u64, buf: &mut [u8]) -> Option<()> {
        self.f.seek(SeekFrom::Start(off)).ok()?;
        self.f.read_exact(buf).ok()
    }

    fn read_byte(&mut self, off: u64) -> Option<u8> {
        let mut b = [0u8; 1];
        self.read_at(off, &mut b)?;
        Some(b[0])
    }

    fn peek_fourcc(&mut self, off: u64) -> Option<[u8; 4]> {
        let mut buf = [0u8; 8];
        self.read_at(off, &mut buf)?;
        Some(buf[4..8].try_into().unwrap())
    }

    /// Returns `(box_size, fourcc, header_len)`. Handles the 64-bit
    /// `largesize` extension; does not handle `uuid` extended types.
    fn read_box_header(&mut self, off: u64) -> Option<(u64, [u8; 4], u64)> {
        let mut buf = [0u8; 8];
        self.read_at(off, &mut buf)?;
        let size32 = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let fourcc: [u8; 4] = buf[4..8].try_into().unwrap();
        if size32 == 1 {
            let mut ext = [0u8; 8];
            self.read_at(off + 8, &mut ext)?;
            let size64 = u64::from_be_bytes(ext);
            Some((size64, fourcc, 16))
        } else if size32 == 0 {
            Some((self.len.saturating_sub(off), fourcc, 8))
        } else {
            Some((size32 as u64, fourcc, 8))
        }
    }
}
