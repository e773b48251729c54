use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use crate::infra::*;

#[tokio::test]
async fn socket_response_is_relayed_unchanged() {
    let path = temp_socket("relay");
    let docker = spawn_docker(&path).unwrap();
    let door = FrontDoor::start(path.to_str().unwrap()).await.unwrap();

    let reply = door
        .get("/localdockerapi/containers/json?all=1")
        .await
        .unwrap();
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.headers["x-test"], "v");
    let cookies: Vec<&str> = reply
        .headers
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies, ["a=1", "b=2"]);
    assert_eq!(reply.headers["x-path"], "/containers/json?all=1");
    assert_eq!(reply.text(), DOCKER_BODY);

    docker.abort();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn bare_prefix_reaches_socket_root() {
    let path = temp_socket("root");
    let docker = spawn_docker(&path).unwrap();
    let door = FrontDoor::start(&format!("unix://{}", path.display()))
        .await
        .unwrap();

    let reply = door.get("/localdockerapi").await.unwrap();
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.headers["x-path"], "/");

    docker.abort();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn trailing_slash_reaches_socket_root() {
    let path = temp_socket("slash");
    let docker = spawn_docker(&path).unwrap();
    let door = FrontDoor::start(path.to_str().unwrap()).await.unwrap();

    let reply = door.get("/localdockerapi/?all=1").await.unwrap();
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.headers["x-path"], "/?all=1");

    docker.abort();
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn unreachable_socket_returns_500() {
    let path = temp_socket("gone");
    let docker = spawn_docker(&path).unwrap();
    let door = FrontDoor::start(path.to_str().unwrap()).await.unwrap();

    docker.abort();
    let _ = docker.await;
    let _ = std::fs::remove_file(&path);

    let reply = door.get("/localdockerapi/_ping").await.unwrap();
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!reply.body.is_empty());
}

#[tokio::test]
async fn tcp_endpoint_is_proxied_over_http() {
    let docker = spawn_router(Router::new().route(
        "/v1.43/info",
        get(|| async { (StatusCode::ACCEPTED, "tcp docker") }),
    ))
    .await
    .unwrap();
    let door = FrontDoor::start(&format!("tcp://{docker}")).await.unwrap();

    let reply = door.get("/localdockerapi/v1.43/info").await.unwrap();
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(reply.text(), "tcp docker");
}
