use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::pipeline::energy::summarize_route;
use crate::state::AppState;
use crate::types::activity::StoredRoute;
use crate::types::energy::{RouteEnergySummary, WindSample};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/routes/:route_id", get(get_route))
        .route("/api/routes/:route_id/energy", post(compute_energy))
}

#[derive(Debug, Default, Deserialize)]
struct EnergyRequest {
    rider_mass_kg: Option<f64>,
    #[serde(default)]
    wind: Vec<WindSample>,
}

async fn get_route(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> Result<Json<StoredRoute>, AppError> {
    Ok(Json(state.store().get_route(&route_id)?))
}

async fn compute_energy(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
    Json(request): Json<EnergyRequest>,
) -> Result<Json<RouteEnergySummary>, AppError> {
    let route = state.store().get_route(&route_id)?;
    let rider_mass = request
        .rider_mass_kg
        .filter(|mass| mass.is_finite() && *mass > 0.0)
        .unwrap_or(state.config().default_rider_mass_kg);

    let summary = summarize_route(&route.to_trackpoints(), &request.wind, Some(rider_mass));
    state.store().set_energy(&route_id, summary)?;

    tracing::info!(
        "Route {} energy: power-based {:?}, estimated {:?}",
        route_id,
        summary.calories_power_based,
        summary.calories_estimated
    );

    Ok(Json(summary))
}
