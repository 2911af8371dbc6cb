//! Ranged media streaming: spec.md §4.6.1's six steps, minus the literal
//! fork — the accept loop already handed this connection its own task, so
//! there is no separate worker to spawn; this function simply keeps that
//! task past dispatch for as long as the transfer runs.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use dms_core::MediaKind;

use crate::context::ServerContext;
use crate::error::HttpError;
use crate::request::Request;

const SEND_CHUNK: usize = 64 * 1024;

const DLNA_V1_5: u32 = 0x0010_0000;
const HTTP_STALLING: u32 = 0x0020_0000;
const TM_BACKGROUND: u32 = 0x0040_0000;
const TM_INTERACTIVE: u32 = 0x0080_0000;
const TM_STREAMING: u32 = 0x0100_0000;

pub async fn serve<W: AsyncWrite + Unpin>(
    ctx: &ServerContext,
    req: &Request,
    detail_id: i64,
    writer: &mut W,
) -> Result<(), HttpError> {
    let detail = ctx
        .store
        .get_detail(detail_id)
        .await
        .map_err(|_| HttpError::Internal)?
        .ok_or(HttpError::NotFound)?;
    let path = detail.path.as_deref().ok_or(HttpError::NotFound)?;
    let resolved = resolve_path(ctx, path)?;

    let transfer_mode = req.header("transfermode.dlna.org").unwrap_or("").to_string();
    let is_image = detail.media_kind == MediaKind::Image;

    if transfer_mode.eq_ignore_ascii_case("Streaming") && is_image {
        return Err(HttpError::NotAcceptable);
    }
    if transfer_mode.eq_ignore_ascii_case("Interactive") {
        if req.header("realtimeinfo.dlna.org").is_some() {
            return Err(HttpError::BadRequest);
        }
        if !is_image && ctx.strict_dlna {
            return Err(HttpError::NotAcceptable);
        }
    }
    if transfer_mode.eq_ignore_ascii_case("Background") {
        tracing::debug!(path = %resolved.display(), "background transfer: lowering priority is a no-op on this platform");
    }

    // TimeSeekRange/PlaySpeed only make sense alongside a byte Range; a
    // renderer asking for either without one gets turned away rather than
    // silently served the whole resource from the start.
    if req.header("range").is_none() && wants_seek_without_byte_range(req) {
        return Err(HttpError::NotAcceptable);
    }

    let mut file = File::open(&resolved).await?;
    let size = file.metadata().await?.len();

    let effective_mode = if transfer_mode.is_empty() {
        if is_image { "Interactive" } else { "Streaming" }
    } else {
        transfer_mode.as_str()
    };

    let (status, reason, start, end) = match req.header("range") {
        Some(range) => {
            let (s, e) = parse_range(range, size)?;
            (206u16, "Partial Content", s, e)
        }
        None => (200u16, "OK", 0, size.saturating_sub(1)),
    };
    let content_length = end - start + 1;

    let mut flags = DLNA_V1_5 | HTTP_STALLING | TM_BACKGROUND;
    flags |= if is_image { TM_INTERACTIVE } else { TM_STREAMING };
    let pn_prefix = detail
        .dlna_profile
        .as_deref()
        .map(|p| format!("DLNA.ORG_PN={p};"))
        .unwrap_or_default();
    let content_features = format!("{pn_prefix}DLNA.ORG_OP=01;DLNA.ORG_CI=0;DLNA.ORG_FLAGS={flags:08X}{:024}", 0);

    let mut headers = vec![
        ("Accept-Ranges".to_string(), "bytes".to_string()),
        ("transferMode.dlna.org".to_string(), effective_mode.to_string()),
        ("contentFeatures.dlna.org".to_string(), content_features),
    ];
    if let Some(mime) = &detail.mime {
        headers.push(("Content-Type".to_string(), mime.clone()));
    }
    if status == 206 {
        headers.push(("Content-Range".to_string(), format!("bytes {start}-{end}/{size}")));
    }
    if req.header("getcaptioninfo.sec") == Some("1") {
        if let Ok(Some(_)) = ctx.store.get_caption(detail_id).await {
            headers.push((
                "CaptionInfo.sec".to_string(),
                format!("{}/Captions/{detail_id}.srt", ctx.base_url),
            ));
        }
    }

    crate::response::write_status_and_headers(writer, status, reason, &headers, content_length).await?;

    if req.method != "HEAD" {
        send_body(&mut file, writer, start, content_length).await?;
    }

    Ok(())
}

fn wants_seek_without_byte_range(req: &Request) -> bool {
    req.header("timeseekrange.dlna.org").is_some() || req.header("playspeed.dlna.org").is_some()
}

fn resolve_path(ctx: &ServerContext, path: &str) -> Result<PathBuf, HttpError> {
    let candidate = PathBuf::from(path);
    if !ctx.disallow_wide_links {
        return Ok(candidate);
    }
    let real = std::fs::canonicalize(&candidate).map_err(|_| HttpError::NotFound)?;
    for root in ctx.media_roots.iter().chain(std::iter::once(&ctx.db_dir)) {
        if let Ok(root_real) = std::fs::canonicalize(root) {
            if real.starts_with(&root_real) {
                return Ok(real);
            }
        }
    }
    Err(HttpError::Forbidden)
}

/// `end missing or == size` folds to `size - 1`; `start > end` or
/// `start < 0` is 400; `end >= size` is 416 — in that order, per spec.
fn parse_range(header: &str, size: u64) -> Result<(u64, u64), HttpError> {
    let spec = header.strip_prefix("bytes=").ok_or(HttpError::BadRequest)?;
    let (start_s, end_s) = spec.split_once('-').ok_or(HttpError::BadRequest)?;
    let start: i64 = start_s.parse().map_err(|_| HttpError::BadRequest)?;
    let mut end: i64 = if end_s.is_empty() {
        size as i64 - 1
    } else {
        end_s.parse().map_err(|_| HttpError::BadRequest)?
    };
    if end == size as i64 {
        end = size as i64 - 1;
    }
    if start > end || start < 0 {
        return Err(HttpError::BadRequest);
    }
    if end >= size as i64 {
        return Err(HttpError::RangeNotSatisfiable);
    }
    Ok((start as u64, end as u64))
}

/// Read/write loop with a 64 KiB buffer. A platform `sendfile` fast path
/// is not wired in here — it would need a libc binding outside this
/// crate's dependency stack — so this is always the fallback path spec.md
/// describes for `EOVERFLOW`/`EINVAL`.
async fn send_body<W: AsyncWrite + Unpin>(file: &mut File, writer: &mut W, start: u64, len: u64) -> Result<(), HttpError> {
    file.seek(std::io::SeekFrom::Start(start)).await?;
    let mut remaining = len;
    let mut buf = vec![0u8; SEND_CHUNK];
    while remaining > 0 {
        let want = remaining.min(SEND_CHUNK as u64) as usize;
        let n = file.read(&mut buf[..want]).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        remaining -= n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request_with_headers(headers: &[(&str, &str)]) -> Request {
        let mut map = HashMap::new();
        for (k, v) in headers {
            map.insert(k.to_string(), v.to_string());
        }
        Request {
            method: "GET".to_string(),
            path: "/MediaItems/1.mp4".to_string(),
            headers: map,
            body: Vec::new(),
        }
    }

    #[test]
    fn timeseekrange_without_byte_range_wants_rejection() {
        let req = request_with_headers(&[("timeseekrange.dlna.org", "npt=10-")]);
        assert!(req.header("range").is_none() && wants_seek_without_byte_range(&req));
    }

    #[test]
    fn playspeed_without_byte_range_wants_rejection() {
        let req = request_with_headers(&[("playspeed.dlna.org", "1")]);
        assert!(req.header("range").is_none() && wants_seek_without_byte_range(&req));
    }

    #[test]
    fn timeseekrange_alongside_a_byte_range_is_fine() {
        let req = request_with_headers(&[("timeseekrange.dlna.org", "npt=10-"), ("range", "bytes=0-99")]);
        assert!(!(req.header("range").is_none() && wants_seek_without_byte_range(&req)));
    }

    #[test]
    fn missing_range_end_folds_to_size_minus_one() {
        assert_eq!(parse_range("bytes=0-", 1000).unwrap(), (0, 999));
    }

    #[test]
    fn end_equal_to_size_folds_to_size_minus_one() {
        assert_eq!(parse_range("bytes=10-1000", 1000).unwrap(), (10, 999));
    }

    #[test]
    fn start_past_end_is_bad_request() {
        assert!(matches!(parse_range("bytes=500-100", 1000), Err(HttpError::BadRequest)));
    }

    #[test]
    fn end_past_size_is_range_not_satisfiable() {
        assert!(matches!(
            parse_range("bytes=0-1000", 1000),
            Err(HttpError::RangeNotSatisfiable)
        ));
    }
}
