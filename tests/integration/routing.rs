use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use dockgate_services::{MembershipEvent, ProxyAdapter};

use crate::infra::*;

#[tokio::test]
async fn joined_peer_is_reachable_by_name() {
    let path = temp_socket("peer");
    let docker = spawn_docker(&path).unwrap();
    let peer = FrontDoor::start(path.to_str().unwrap()).await.unwrap();
    let door = FrontDoor::start(path.to_str().unwrap()).await.unwrap();
    let events = door.watcher(peer.addr.port()).await.unwrap();

    let loopback = "127.0.0.1".parse().unwrap();
    events
        .apply(&MembershipEvent::join("node-b", loopback))
        .unwrap();

    let reply = door.get("/dockerapi/node-b/info?verbose=1").await.unwrap();
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.headers["x-path"], "/info?verbose=1");
    assert_eq!(reply.text(), DOCKER_BODY);

    let peers = door.get("/peers").await.unwrap().json().unwrap();
    assert_eq!(
        peers,
        serde_json::json!([{ "name": "node-b", "address": "127.0.0.1" }])
    );

    events
        .apply(&MembershipEvent::leave("node-b", loopback))
        .unwrap();
    let reply = door.get("/dockerapi/node-b/info").await.unwrap();
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    docker.abort();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn peer_name_needing_escapes_is_routed() {
    let path = temp_socket("escaped");
    let docker = spawn_docker(&path).unwrap();
    let peer = FrontDoor::start(path.to_str().unwrap()).await.unwrap();
    let door = FrontDoor::start("http://127.0.0.1:9").await.unwrap();
    let events = door.watcher(peer.addr.port()).await.unwrap();
    events
        .apply(&MembershipEvent::join("node a", "127.0.0.1".parse().unwrap()))
        .unwrap();

    let reply = door.get("/dockerapi/node%20a/info").await.unwrap();
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.headers["x-path"], "/info");

    let reply = door.get("/dockerapi/node%20a/").await.unwrap();
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.headers["x-path"], "/");

    docker.abort();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn unknown_peer_is_404() {
    let door = FrontDoor::start("http://127.0.0.1:9").await.unwrap();
    let reply = door.get("/dockerapi/nobody/containers/json").await.unwrap();
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_peer_does_not_block_other_peers() {
    let slow = spawn_router(Router::new().route(
        "/localdockerapi/info",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "slow"
        }),
    ))
    .await
    .unwrap();
    let fast = spawn_router(Router::new().route("/localdockerapi/info", get(|| async { "fast" })))
        .await
        .unwrap();

    let door = Arc::new(FrontDoor::start("http://127.0.0.1:9").await.unwrap());
    for (name, addr) in [("slow", slow), ("fast", fast)] {
        let adapter =
            ProxyAdapter::from_endpoint(&format!("http://{addr}/localdockerapi"), None).unwrap();
        door.routes.install(name, addr.ip().to_string(), adapter);
    }

    let pending = {
        let door = door.clone();
        tokio::spawn(async move { door.get("/dockerapi/slow/info").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let reply = door.get("/dockerapi/fast/info").await.unwrap();
    assert_eq!(reply.text(), "fast");
    assert!(started.elapsed() < Duration::from_secs(1));

    let reply = pending.await.unwrap().unwrap();
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text(), "slow");
}
