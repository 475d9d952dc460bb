//! HTTP handlers: batch search, SSE streaming search, site listing.
//!
//! Thin layer — all search behavior lives in the engine. The streaming
//! endpoint takes its parameters from the query string for EventSource
//! compatibility (EventSource cannot send a request body).

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::error;

use pricescout_common::{PriceRequest, SearchError};

use crate::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp(),
        "service": "pricescout",
    }))
}

pub async fn prices(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PriceRequest>,
) -> Response {
    if request.country.trim().is_empty() || request.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "country and query are required"})),
        )
            .into_response();
    }

    match state.engine.search(&request.country, &request.query).await {
        Ok(response) => Json(response).into_response(),
        Err(e @ SearchError::NoSitesForCountry { .. }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Search failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct StreamParams {
    country: Option<String>,
    query: Option<String>,
}

pub async fn prices_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
) -> Response {
    let (Some(country), Some(query)) = (params.country, params.query) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "country and query parameters are required"})),
        )
            .into_response();
    };

    match state.engine.clone().search_streaming(&country, &query) {
        Ok(rx) => {
            let events = ReceiverStream::new(rx).filter_map(|event| {
                Event::default()
                    .event(event.kind())
                    .json_data(&event)
                    .ok()
                    .map(Ok::<_, Infallible>)
            });
            Sse::new(events).keep_alive(KeepAlive::default()).into_response()
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

pub async fn sites(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sites = state.engine.site_names();
    Json(serde_json::json!({
        "count": sites.len(),
        "sites": sites,
    }))
}
