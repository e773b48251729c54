//! Reverse proxy to an HTTP endpoint over TCP.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{self, HeaderValue};
use axum::http::uri::{Authority, Scheme};
use axum::http::{Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use super::{strip_hop_by_hop, within};
use crate::error::ProxyError;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

pub struct NetworkProxy {
    authority: Authority,
    /// Target path prefix without a trailing slash; empty for the root.
    base_path: String,
    client: Client<HttpConnector, Body>,
    timeout: Option<Duration>,
}

impl NetworkProxy {
    /// Proxy to `target`, an absolute `http://host[:port][/prefix]` URL.
    pub fn new(target: &str, timeout: Option<Duration>) -> Result<Self, ProxyError> {
        let invalid = |reason: &str| ProxyError::InvalidUrl {
            endpoint: target.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = target.parse().map_err(|e: axum::http::uri::InvalidUri| {
            invalid(&e.to_string())
        })?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(ProxyError::UnsupportedScheme(other.to_string())),
            None => return Err(invalid("missing scheme")),
        }
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| invalid("missing host"))?;
        if authority.host().is_empty() {
            return Err(invalid("missing host"));
        }

        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            authority,
            base_path: uri.path().trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn target(&self) -> String {
        format!("http://{}{}", self.authority, self.base_path)
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        match within(self.timeout, self.forward(req)).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(upstream = %self.target(), error = %e, "network proxy request failed");
                e.into_response()
            }
        }
    }

    async fn forward(&self, mut req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        *req.uri_mut() = self.upstream_uri(req.uri())?;

        let client_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let headers = req.headers_mut();
        strip_hop_by_hop(headers);
        let host = HeaderValue::from_str(self.authority.as_str()).map_err(axum::http::Error::from)?;
        headers.insert(header::HOST, host);
        if let Some(ip) = client_ip {
            let forwarded = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(prior) => format!("{prior}, {ip}"),
                None => ip.to_string(),
            };
            let value = HeaderValue::from_str(&forwarded).map_err(axum::http::Error::from)?;
            headers.insert(X_FORWARDED_FOR, value);
        }

        let upstream = self.client.request(req).await?;
        let (mut parts, body) = upstream.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    /// Join the target prefix with the request path, keeping the query.
    fn upstream_uri(&self, uri: &Uri) -> Result<Uri, ProxyError> {
        let path = join_path(&self.base_path, uri.path());
        let path_and_query = match uri.query() {
            Some(q) => format!("{path}?{q}"),
            None => path,
        };
        Ok(Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?)
    }
}

fn join_path(base: &str, path: &str) -> String {
    match (base.is_empty(), path) {
        (true, "") => "/".to_string(),
        (true, p) => p.to_string(),
        (false, "" | "/") => base.to_string(),
        (false, p) if p.starts_with('/') => format!("{base}{p}"),
        (false, p) => format!("{base}/{p}"),
    }
}
