pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod storage;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::util::ServiceExt;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::services::session::SessionStore;
use crate::storage::DynStorage;

#[derive(Clone)]
pub struct AppState {
    pub storage: DynStorage,
    pub sessions: SessionStore,
    pub config: Config,
}

/// Build the full application router over the given state.
pub fn app(state: AppState) -> Router {
    let api_router = Router::new()
        .merge(routes::auth::router())
        .nest("/skills", routes::skills::router())
        .nest("/messages", routes::messages::router())
        .nest("/exchanges", routes::exchanges::router())
        .nest("/reviews", routes::reviews::router())
        .nest("/stats", routes::stats::router())
        .nest("/admin", routes::admin::router());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .fallback(serve_spa)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn serve_spa(req: Request<Body>) -> Response {
    let path = req.uri().path();

    // Try to serve static file first
    let static_path = format!("static{path}");
    if std::path::Path::new(&static_path).exists() {
        let serve_dir = ServeDir::new("static");
        // ServeDir's error type is Infallible
        let res = match serve_dir.oneshot(req).await {
            Ok(res) => res,
            Err(never) => match never {},
        };
        return res.into_response();
    }

    // For SPA routes, serve index.html
    match tokio::fs::read("static/index.html").await {
        Ok(contents) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/html")
            .body(Body::from(contents))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(_) => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("Not found"))
            .unwrap_or_else(|_| StatusCode::NOT_FOUND.into_response()),
    }
}
