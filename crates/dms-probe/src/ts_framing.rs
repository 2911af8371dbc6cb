//! MPEG-TS packet framing detection: distinguishes 188-byte "raw" TS from
//! 192-byte "DLNA TS" framing (4 timestamp bytes trailing each 188-byte
//! packet, just before the next sync) by locating the 0x47 sync byte and
//! checking whether it repeats at a 188- or 192-byte stride.

use std::io::{self, Read};

const SYNC: u8 = 0x47;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// 192-byte DLNA framing. `timestamp_present` tells whether the 4-byte
    /// trailer at `sync+188` (immediately before the next sync byte) carries
    /// a non-zero timestamp.
    Dlna192 { timestamp_present: bool },
    Raw188,
}

/// Read the first 576 bytes of `r` and classify the framing. Returns `Ok(None)`
/// if no sync pattern could be established (not recognizable as TS at all).
pub fn detect<R: Read>(r: &mut R) -> io::Result<Option<Framing>> {
    let mut buf = [0u8; 576];
    let n = read_up_to(r, &mut buf)?;
    if n < 576 {
        return Ok(None);
    }

    for offset in 0..192 {
        if buf[offset] != SYNC {
            continue;
        }
        let has_192 = offset + 384 < n && buf[offset + 192] == SYNC && buf[offset + 384] == SYNC;
        if has_192 {
            let timestamp_present = offset + 192 <= n && buf[offset + 188..offset + 192].iter().any(|&b| b != 0);
            return Ok(Some(Framing::Dlna192 { timestamp_present }));
        }
        let has_188 = offset + 376 < n && buf[offset + 188] == SYNC && buf[offset + 376] == SYNC;
        if has_188 {
            return Ok(Some(Framing::Raw188));
        }
    }
    Ok(None)
}

fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match r.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn packetize(packet_len: usize, trailer: [u8; 4]) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..4 {
            out.push(SYNC);
            out.extend(std::iter::repeat(0u8).take(187));
            if packet_len == 192 {
                out.extend_from_slice(&trailer);
            }
        }
        out
    }

    #[test]
    fn detects_raw_188() {
        let data = packetize(188, [0; 4]);
        let mut c = Cursor::new(data);
        assert_eq!(detect(&mut c).unwrap(), Some(Framing::Raw188));
    }

    #[test]
    fn detects_dlna_192_with_timestamp() {
        let data = packetize(192, [1, 2, 3, 4]);
        let mut c = Cursor::new(data);
        assert_eq!(
            detect(&mut c).unwrap(),
            Some(Framing::Dlna192 {
                timestamp_present: true
            })
        );
    }

    #[test]
    fn detects_dlna_192_empty_timestamp() {
        let data = packetize(192, [0, 0, 0, 0]);
        let mut c = Cursor::new(data);
        assert_eq!(
            detect(&mut c).unwrap(),
            Some(Framing::Dlna192 {
                timestamp_present: false
            })
        );
    }
}
