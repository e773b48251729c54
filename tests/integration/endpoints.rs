use axum::http::StatusCode;
use dockgate_services::MembershipEvent;

use crate::infra::*;

#[tokio::test]
async fn endpoints_track_membership_without_loopback() {
    let door = FrontDoor::start("http://127.0.0.1:9").await.unwrap();
    let events = door.watcher(9000).await.unwrap();

    let reply = door.get("/endpoints").await.unwrap();
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json().unwrap(), serde_json::json!([]));

    events
        .apply(&MembershipEvent::join("node-c", "10.0.0.3".parse().unwrap()))
        .unwrap();
    events
        .apply(&MembershipEvent::join("node-b", "10.0.0.2".parse().unwrap()))
        .unwrap();
    let listed = door.get("/endpoints").await.unwrap().json().unwrap();
    assert_eq!(listed, serde_json::json!(["10.0.0.2", "10.0.0.3"]));

    events
        .apply(&MembershipEvent::leave("node-b", "10.0.0.2".parse().unwrap()))
        .unwrap();
    let listed = door.get("/endpoints").await.unwrap().json().unwrap();
    assert_eq!(listed, serde_json::json!(["10.0.0.3"]));
}

#[tokio::test]
async fn static_assets_are_served_at_root() {
    let name = format!("dockgate-it-{}.html", std::process::id());
    std::fs::write(std::env::temp_dir().join(&name), "<h1>dockgate</h1>").unwrap();
    let door = FrontDoor::start("http://127.0.0.1:9").await.unwrap();

    let reply = door.get(&format!("/{name}")).await.unwrap();
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text(), "<h1>dockgate</h1>");

    let missing = door.get("/no-such-asset.js").await.unwrap();
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let _ = std::fs::remove_file(std::env::temp_dir().join(&name));
}
