//! Unix-socket adapter: one HTTP/1.1 connection per request.
//!
//! Nothing is pooled. The connection driver task owns the stream and exits
//! once the request sender and the response body have both been dropped,
//! so the socket is released on every path, including errors and timeouts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::http::{Request, Response, Uri, Version};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use super::{copy_headers, strip_hop_by_hop, within};
use crate::error::ProxyError;

pub struct SocketProxy {
    path: PathBuf,
    timeout: Option<Duration>,
}

impl SocketProxy {
    /// Adapter for the socket at `path`. The path must exist now.
    pub fn open(path: impl Into<PathBuf>, timeout: Option<Duration>) -> Result<Self, ProxyError> {
        let path = path.into();
        match std::fs::metadata(&path) {
            Ok(_) => Ok(Self { path, timeout }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProxyError::SocketMissing(path))
            }
            Err(e) => Err(ProxyError::SocketUnreadable(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        match within(self.timeout, self.exchange(req)).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(socket = %self.path.display(), error = %e, "socket proxy request failed");
                e.into_response()
            }
        }
    }

    async fn exchange(&self, mut req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|e| ProxyError::Connect(self.path.clone(), e))?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

        let socket = self.path.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(socket = %socket.display(), error = %e, "socket connection ended with error");
            }
        });

        prepare(&mut req)?;
        let upstream = sender.send_request(req).await?;

        let (parts, body) = upstream.into_parts();
        let mut resp = Response::new(Body::new(body));
        *resp.status_mut() = parts.status;
        copy_headers(resp.headers_mut(), &parts.headers);

        tracing::trace!(socket = %self.path.display(), status = %parts.status, "socket proxy response");
        Ok(resp)
    }
}

/// Reduce the request to origin-form HTTP/1.1 with a Host header.
fn prepare(req: &mut Request<Body>) -> Result<(), ProxyError> {
    let origin = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let origin: Uri = origin.parse().map_err(axum::http::Error::from)?;
    *req.uri_mut() = origin;
    *req.version_mut() = Version::HTTP_11;

    strip_hop_by_hop(req.headers_mut());
    if !req.headers().contains_key(header::HOST) {
        req.headers_mut()
            .insert(header::HOST, HeaderValue::from_static("localhost"));
    }
    Ok(())
}
