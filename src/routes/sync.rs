use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::pipeline::process::build_stored_route;
use crate::pipeline::sync::ingest_activity;
use crate::state::AppState;
use crate::types::activity::Coordinate;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/sync/ingest", post(ingest))
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    route_id: Option<String>,
    vendor: Option<String>,
    activity: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub route_id: String,
    pub source_key: Option<String>,
    pub point_count: usize,
    pub dropped: usize,
    pub has_route_data: bool,
    pub coordinates: Vec<Coordinate>,
}

async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let route_id = request
        .route_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let vendor = request.vendor.as_deref().unwrap_or("unknown");
    state
        .store()
        .record_vendor_response(vendor, request.activity.clone());

    let ingested = ingest_activity(&route_id, &request.activity);
    let route = build_stored_route(&route_id, None, &ingested.trackpoints);
    let response = IngestResponse {
        route_id: route_id.clone(),
        source_key: ingested.source_key.map(str::to_string),
        point_count: ingested.trackpoints.len(),
        dropped: ingested.dropped,
        has_route_data: ingested.trackpoints.len() >= 2,
        coordinates: route.coordinates.clone(),
    };
    state.store().save_route(route);

    Ok(Json(response))
}
