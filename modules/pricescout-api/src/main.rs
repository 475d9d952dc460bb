use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Ollama;
use pricescout_common::{Config, SiteCatalog};
use pricescout_engine::{HttpFetcher, SearchEngine};

mod routes;

pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pricescout=info".parse()?))
        .init();

    let config = Config::from_env();

    let catalog = Arc::new(SiteCatalog::builtin());
    let model = Arc::new(Ollama::new(&config.ollama_host, &config.ollama_model));
    let fetcher = Arc::new(HttpFetcher::new()?);
    let engine = Arc::new(SearchEngine::new(catalog, model, fetcher));

    let state = Arc::new(AppState { engine });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        .route("/api/v1/health", get(routes::health))
        // Search
        .route("/api/v1/prices", post(routes::prices))
        .route("/api/v1/prices/stream", get(routes::prices_stream))
        .route("/api/v1/sites", get(routes::sites))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Results are per-request and never cacheable
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("0.0.0.0:{}", config.port);
    info!("pricescout API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
