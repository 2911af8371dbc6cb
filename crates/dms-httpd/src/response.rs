use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::HttpError;

/// Write a complete, non-streaming response: status line, headers,
/// `Content-Length`, blank line, body.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: u16,
    reason: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> Result<(), HttpError> {
    let mut head = format!("HTTP/1.1 {status} {reason}\r\n");
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    head.push_str("Connection: keep-alive\r\n\r\n");
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body).await?;
    Ok(())
}

/// Write status line + headers + `Content-Length` for a response whose body
/// is streamed separately by the caller (ranged media transfers).
pub async fn write_status_and_headers<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: u16,
    reason: &str,
    headers: &[(String, String)],
    content_length: u64,
) -> Result<(), HttpError> {
    let mut head = format!("HTTP/1.1 {status} {reason}\r\n");
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str(&format!("Content-Length: {content_length}\r\n"));
    head.push_str("Connection: keep-alive\r\n\r\n");
    writer.write_all(head.as_bytes()).await?;
    Ok(())
}

/// Render `err` as the minimal HTML error body spec.md's HTTP core calls for.
pub async fn write_error<W: AsyncWrite + Unpin>(writer: &mut W, err: &HttpError) -> Result<(), HttpError> {
    let (status, reason) = err.status();
    let body = format!("<html><body><h1>{status} {reason}</h1></body></html>");
    write_response(
        writer,
        status,
        reason,
        &[("Content-Type".to_string(), "text/html".to_string())],
        body.as_bytes(),
    )
    .await
}
