use axum::{extract::State, routing::post, Json, Router};

use crate::error::AppError;
use crate::pipeline::energy::estimate_energy;
use crate::state::AppState;
use crate::types::energy::{EnergyEstimate, EnergyInput};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/energy/estimate", post(estimate))
}

async fn estimate(
    State(state): State<AppState>,
    Json(mut input): Json<EnergyInput>,
) -> Result<Json<EnergyEstimate>, AppError> {
    if input.rider_mass_kg.is_none() {
        input.rider_mass_kg = Some(state.config().default_rider_mass_kg);
    }
    Ok(Json(estimate_energy(&input)))
}
