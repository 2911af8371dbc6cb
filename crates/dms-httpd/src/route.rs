//! Request routing: the static descriptor XML, the one streaming path
//! under `/MediaItems/`, and the SOAP control endpoint.

use tokio::io::AsyncWrite;

use crate::context::ServerContext;
use crate::descriptor;
use crate::error::HttpError;
use crate::request::Request;
use crate::response::{write_error, write_response};
use crate::stream;

/// Handle one request, writing its response to `writer`. Returns whether
/// the connection should stay open for another request.
pub async fn handle<W: AsyncWrite + Unpin>(ctx: &ServerContext, req: &Request, writer: &mut W) -> bool {
    if let Err(err) = dispatch(ctx, req, writer).await {
        let _ = write_error(writer, &err).await;
    }
    true
}

async fn dispatch<W: AsyncWrite + Unpin>(ctx: &ServerContext, req: &Request, writer: &mut W) -> Result<(), HttpError> {
    let method = req.method.as_str();

    match (method, req.path.as_str()) {
        ("GET", "/rootDesc.xml") | ("HEAD", "/rootDesc.xml") => {
            let xml = descriptor::root_desc_xml(&ctx.friendly_name, &ctx.device_uuid, &ctx.base_url);
            write_xml(writer, method, &xml).await
        }
        ("GET", "/ContentDirectory.xml") | ("HEAD", "/ContentDirectory.xml") => {
            write_xml(writer, method, descriptor::content_directory_scpd()).await
        }
        ("GET", "/ConnectionManager.xml") | ("HEAD", "/ConnectionManager.xml") => {
            write_xml(writer, method, descriptor::connection_manager_scpd()).await
        }
        ("GET", path) | ("HEAD", path) if path.starts_with("/MediaItems/") => {
            let detail_id = parse_detail_id(path).ok_or(HttpError::NotFound)?;
            stream::serve(ctx, req, detail_id, writer).await
        }
        ("POST", _) => handle_soap(ctx, req, writer).await,
        _ => Err(HttpError::NotFound),
    }
}

async fn write_xml<W: AsyncWrite + Unpin>(writer: &mut W, method: &str, xml: &str) -> Result<(), HttpError> {
    let body = if method == "HEAD" { &[][..] } else { xml.as_bytes() };
    write_response(
        writer,
        200,
        "OK",
        &[("Content-Type".to_string(), "text/xml; charset=\"utf-8\"".to_string())],
        body,
    )
    .await
}

async fn handle_soap<W: AsyncWrite + Unpin>(ctx: &ServerContext, req: &Request, writer: &mut W) -> Result<(), HttpError> {
    let soap_action = req.header("soapaction").unwrap_or("").to_string();
    let body = String::from_utf8_lossy(&req.body).into_owned();

    match ctx.dispatcher.dispatch(&soap_action, &body).await {
        Ok(envelope) => {
            write_response(
                writer,
                200,
                "OK",
                &[("Content-Type".to_string(), "text/xml; charset=\"utf-8\"".to_string())],
                envelope.as_bytes(),
            )
            .await
        }
        Err(fault) => {
            let envelope = fault.to_envelope();
            write_response(
                writer,
                500,
                "Internal Server Error",
                &[("Content-Type".to_string(), "text/xml; charset=\"utf-8\"".to_string())],
                envelope.as_bytes(),
            )
            .await
        }
    }
}

/// `/MediaItems/<detail_id>.<ext>` -> `detail_id`. The extension exists
/// only so players that sniff by suffix get something plausible; it plays
/// no role in lookup.
fn parse_detail_id(path: &str) -> Option<i64> {
    let rest = path.strip_prefix("/MediaItems/")?;
    let stem = rest.split('.').next()?;
    stem.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detail_id_from_media_item_path() {
        assert_eq!(parse_detail_id("/MediaItems/42.mp4"), Some(42));
        assert_eq!(parse_detail_id("/MediaItems/42"), Some(42));
        assert_eq!(parse_detail_id("/MediaItems/abc.mp4"), None);
        assert_eq!(parse_detail_id("/other/42.mp4"), None);
    }
}
