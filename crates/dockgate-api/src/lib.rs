pub mod handlers;

use std::net::SocketAddr;

use axum::routing::{any, get};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use handlers::ApiState;

/// The front door's routes. Anything unmatched is served from the asset directory.
pub fn router(state: ApiState) -> Router {
    let assets = ServeDir::new(&state.assets).append_index_html_on_directories(true);

    Router::new()
        .route("/endpoints", get(handlers::handle_endpoints))
        .route("/peers", get(handlers::handle_peers))
        .route("/localdockerapi", any(handlers::handle_local))
        .route("/localdockerapi/", any(handlers::handle_local))
        .route("/localdockerapi/{*path}", any(handlers::handle_local))
        .route("/dockerapi/{name}", any(handlers::handle_peer))
        .route("/dockerapi/{name}/", any(handlers::handle_peer))
        .route("/dockerapi/{name}/{*path}", any(handlers::handle_peer_path))
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    state: ApiState,
    listen: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "front door listening");

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("front door stopped");
    Ok(())
}
