mod event;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::persistence::HttpDocumentStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");
    let gateway_url =
        std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://localhost:5000/api/v1".into());

    let store = Arc::new(HttpDocumentStore::new(gateway_url.clone()));
    let state = state::AppState::new(store);

    // Spawn background persistence flush task.
    let _flush = services::persistence::spawn_flush_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, %gateway_url, "coderelay listening");
    axum::serve(listener, app).await.expect("server failed");
}
