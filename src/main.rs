use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use bingo_backend::commands::BingoService;
use bingo_backend::config::Config;
use bingo_backend::render::{RenderOptions, SheetFont};
use bingo_backend::store::Store;
use bingo_backend::{api, metrics};

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "bingo-backend" }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    metrics::register_metrics();

    let config = Config::load();
    let font = SheetFont::load(config.font_path.as_deref());
    let store = Store::new(&config.data_dir);
    let service = Arc::new(BingoService::new(store, font, RenderOptions::default()));

    // Drop expired overwrite confirmations in the background so the
    // pending map stays bounded.
    let sweeper = service.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            sweeper.sweep_confirmations();
        }
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(api::router(service))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to port {}: {e}", config.port));

    tracing::info!("Bingo backend listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
