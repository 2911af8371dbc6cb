//! One task per accepted connection: read a request, dispatch it, loop for
//! the next one on the same socket until the peer closes it. The task that
//! reads a `/MediaItems/` request is the same task that streams its body —
//! there is no handoff to a separate worker.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::context::ServerContext;
use crate::request::read_request;
use crate::response::write_error;
use crate::route;

pub async fn serve_connection<S: AsyncRead + AsyncWrite + Unpin>(ctx: Arc<ServerContext>, mut socket: S) {
    loop {
        let req = match read_request(&mut socket).await {
            Ok(Some(req)) => req,
            Ok(None) => return,
            Err(err) => {
                let _ = write_error(&mut socket, &err).await;
                return;
            }
        };

        if !route::handle(&ctx, &req, &mut socket).await {
            return;
        }
    }
}
