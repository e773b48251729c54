//! Proxy routes: /localdockerapi and /dockerapi/{name}.
//!
//! The route prefix is stripped before forwarding, so
//! `/localdockerapi/containers/json?all=1` reaches the engine as
//! `/containers/json?all=1`.

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use super::ApiState;

const LOCAL_PREFIX: &str = "/localdockerapi";
const PEER_PREFIX: &str = "/dockerapi/";

// ── /localdockerapi ───────────────────────────────────────────────────────────

pub async fn handle_local(State(state): State<ApiState>, mut req: Request) -> Response {
    let rest = req
        .uri()
        .path()
        .strip_prefix(LOCAL_PREFIX)
        .unwrap_or("")
        .to_string();
    if let Err(e) = rewrite(&mut req, &rest) {
        return e.into_response();
    }
    state.local.handle(req).await
}

// ── /dockerapi/{name} ─────────────────────────────────────────────────────────

/// Peer name comes from the decoded route parameter; the forwarded remainder
/// is taken from the raw path so its encoding reaches the peer untouched.
pub async fn handle_peer(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    req: Request,
) -> Response {
    forward_peer(state, name, req).await
}

pub async fn handle_peer_path(
    State(state): State<ApiState>,
    Path((name, _)): Path<(String, String)>,
    req: Request,
) -> Response {
    forward_peer(state, name, req).await
}

async fn forward_peer(state: ApiState, name: String, mut req: Request) -> Response {
    let Some(rest) = peer_remainder(req.uri().path()).map(str::to_string) else {
        return (StatusCode::NOT_FOUND, "missing peer name").into_response();
    };
    if let Err(e) = rewrite(&mut req, &rest) {
        return e.into_response();
    }
    state.routes.proxy(&name, req).await
}

/// `/dockerapi/node%20a/containers/json` → `/containers/json`.
fn peer_remainder(path: &str) -> Option<&str> {
    let tail = path.strip_prefix(PEER_PREFIX)?;
    let (name, rest) = match tail.find('/') {
        Some(i) => tail.split_at(i),
        None => (tail, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(rest)
}

/// Point the request at `rest` (or `/`), keeping its query string.
fn rewrite(req: &mut Request<Body>, rest: &str) -> Result<(), (StatusCode, String)> {
    let path = if rest.is_empty() { "/" } else { rest };
    let path_and_query = match req.uri().query() {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };
    let uri: Uri = path_and_query
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid request path".to_string()))?;
    *req.uri_mut() = uri;
    Ok(())
}
