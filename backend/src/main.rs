use std::net::SocketAddr;

use anyhow::Context;
use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};

mod db;
mod domain;
mod rest;
mod validation;

use domain::{BookService, TransactionService};
use rest::AppState;

const BIND_ADDR: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Setting up database");
    let db = db::DbConnection::init().await?;

    // Services are plain values owned by the router state; no globals
    let state = AppState::new(BookService::new(db.clone()), TransactionService::new(db));

    // CORS setup matching the original's "AnyOrigin" policy
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = rest::router(state).layer(cors);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| BIND_ADDR.to_string())
        .parse()
        .context("invalid BIND_ADDR")?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
