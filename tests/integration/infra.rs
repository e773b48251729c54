//! Shared fixtures.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::{HeaderMap, Request, Response, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinHandle;

use dockgate_api::ApiState;
use dockgate_services::{
    EndpointSet, EventLoop, Membership, MembershipError, MembershipWatcher, ProxyAdapter,
    RoutingTable,
};

pub const DOCKER_BODY: &str = "hello";

/// Unique socket path under the temp dir.
pub fn temp_socket(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "dockgate-it-{}-{}.sock",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

/// A fake docker daemon on `path`.
///
/// Answers every request with 201, an `X-Test` header, two `Set-Cookie`
/// headers, the request path echoed in `X-Path`, and the body `hello`.
pub fn spawn_docker(path: &Path) -> Result<JoinHandle<()>> {
    let listener = UnixListener::bind(path)?;
    Ok(tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service_fn(docker_reply))
                    .await;
            });
        }
    }))
}

async fn docker_reply(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let echoed = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    let resp = Response::builder()
        .status(StatusCode::CREATED)
        .header("x-test", "v")
        .header("set-cookie", "a=1")
        .header("set-cookie", "b=2")
        .header("x-path", echoed)
        .body(Full::new(Bytes::from_static(DOCKER_BODY.as_bytes())));
    Ok(resp.unwrap_or_default())
}

/// Membership that always reports one answering seed.
pub struct Seeded;

impl Membership for Seeded {
    fn join(
        &self,
        _seeds: Vec<String>,
    ) -> impl Future<Output = Result<usize, MembershipError>> + Send {
        async { Ok(1) }
    }
}

/// A running front door and the state behind it.
pub struct FrontDoor {
    pub addr: SocketAddr,
    pub endpoints: EndpointSet,
    pub routes: RoutingTable,
    _server: JoinHandle<()>,
}

impl FrontDoor {
    /// Serve a front door whose local adapter targets `endpoint`.
    pub async fn start(endpoint: &str) -> Result<Self> {
        let endpoints = EndpointSet::from_seeds(["127.0.0.1"]);
        let routes = RoutingTable::new();
        let local = ProxyAdapter::from_endpoint(endpoint, None)?;
        let state = ApiState {
            endpoints: endpoints.clone(),
            routes: routes.clone(),
            local: Arc::new(local),
            assets: std::env::temp_dir(),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = dockgate_api::router(state).into_make_service_with_connect_info::<SocketAddr>();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            endpoints,
            routes,
            _server: server,
        })
    }

    /// A membership event loop feeding this front door's state, assuming
    /// every peer serves on `peer_port`.
    pub async fn watcher(&self, peer_port: u16) -> Result<EventLoop> {
        let watcher = MembershipWatcher::new(
            self.endpoints.clone(),
            self.routes.clone(),
            peer_port,
            "/localdockerapi",
            None,
        );
        Ok(watcher.join(&Seeded).await?)
    }

    pub async fn get(&self, path: &str) -> Result<Reply> {
        get(self.addr, path).await
    }
}

/// Serve a bare axum router on loopback.
pub async fn spawn_router(app: axum::Router) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(addr)
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

pub async fn get(addr: SocketAddr, path: &str) -> Result<Reply> {
    let client: Client<HttpConnector, Empty<Bytes>> =
        Client::builder(TokioExecutor::new()).build_http();
    let uri = format!("http://{addr}{path}").parse()?;
    let resp = tokio::time::timeout(Duration::from_secs(10), client.get(uri)).await??;
    let (parts, body) = resp.into_parts();
    Ok(Reply {
        status: parts.status,
        headers: parts.headers,
        body: body.collect().await?.to_bytes(),
    })
}
