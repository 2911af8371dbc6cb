//! Request reading: state `0` (header accumulation), `1` (fixed-length
//! body), `2` (chunked body). There is no persistent struct for these
//! states — each is a loop stage inside [`read_request`], since the whole
//! read happens on one task with no interleaved readiness-wait to survive
//! across.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::HttpError;

const MAX_HEADER_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Read one request off `stream`. `Ok(None)` means the peer closed cleanly
/// before sending anything — the normal end of a persistent connection.
pub async fn read_request<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Option<Request>, HttpError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_crlf_crlf(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(HttpError::BadRequest);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(HttpError::BadRequest);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().ok_or(HttpError::BadRequest)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or(HttpError::BadRequest)?.to_string();
    let path = parts.next().ok_or(HttpError::BadRequest)?.to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_offset = header_end + 4;
    let mut body = buf[content_offset..].to_vec();

    let chunked = headers
        .get("transfer-encoding")
        .map(|v| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false);

    if chunked {
        body = read_chunked_body(stream, body).await?;
    } else if let Some(len) = headers.get("content-length").and_then(|v| v.parse::<usize>().ok()) {
        while body.len() < len {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(HttpError::BadRequest);
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(len);
    }

    Ok(Some(Request { method, path, headers, body }))
}

fn find_crlf_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Decode a chunked body: hex length + CRLF, payload, CRLF, repeat until a
/// zero-length chunk. `carry` holds whatever body bytes already arrived
/// past the header boundary.
async fn read_chunked_body<R: AsyncRead + Unpin>(stream: &mut R, mut carry: Vec<u8>) -> Result<Vec<u8>, HttpError> {
    let mut out = Vec::new();
    let mut chunk_buf = [0u8; 4096];

    loop {
        let size_end = loop {
            if let Some(pos) = carry.windows(2).position(|w| w == b"\r\n") {
                break pos;
            }
            let n = stream.read(&mut chunk_buf).await?;
            if n == 0 {
                return Err(HttpError::BadRequest);
            }
            carry.extend_from_slice(&chunk_buf[..n]);
        };

        let size_line = String::from_utf8_lossy(&carry[..size_end]).into_owned();
        let size_token = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_token, 16).map_err(|_| HttpError::BadRequest)?;
        carry.drain(..size_end + 2);

        if size == 0 {
            break;
        }

        while carry.len() < size + 2 {
            let n = stream.read(&mut chunk_buf).await?;
            if n == 0 {
                return Err(HttpError::BadRequest);
            }
            carry.extend_from_slice(&chunk_buf[..n]);
        }
        out.extend_from_slice(&carry[..size]);
        carry.drain(..size + 2);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_a_simple_get_request() {
        let raw = b"GET /rootDesc.xml HTTP/1.1\r\nHost: 127.0.0.1:8200\r\n\r\n";
        let mut cursor = std::io::Cursor::new(raw.to_vec());
        let req = read_request(&mut cursor).await.unwrap().unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/rootDesc.xml");
        assert_eq!(req.header("host"), Some("127.0.0.1:8200"));
    }

    #[tokio::test]
    async fn reads_a_fixed_length_body() {
        let raw = b"POST /control HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let mut cursor = std::io::Cursor::new(raw.to_vec());
        let req = read_request(&mut cursor).await.unwrap().unwrap();
        assert_eq!(req.body, b"hello");
    }

    #[tokio::test]
    async fn reads_a_chunked_body() {
        let raw = b"POST /control HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
        let mut cursor = std::io::Cursor::new(raw.to_vec());
        let req = read_request(&mut cursor).await.unwrap().unwrap();
        assert_eq!(req.body, b"hello world");
    }

    #[tokio::test]
    async fn clean_close_before_any_bytes_is_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(read_request(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_headers_are_rejected() {
        let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
        raw.extend(std::iter::repeat(b'a').take(MAX_HEADER_BYTES + 1));
        let mut cursor = std::io::Cursor::new(raw);
        assert!(read_request(&mut cursor).await.is_err());
    }
}
