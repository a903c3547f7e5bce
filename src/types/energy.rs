use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inputs to a single calorie estimate. Everything but the duration is optional.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyInput {
    pub avg_power_watts: Option<f64>,
    pub duration_seconds: f64,
    pub distance_km: Option<f64>,
    pub elevation_gain_m: Option<f64>,
    pub rider_mass_kg: Option<f64>,
    pub wind_speed_mps: Option<f64>,
    pub wind_direction_deg: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyStrategy {
    PowerBased,
    PhysicsBased,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Macronutrients {
    pub fat_grams: f64,
    pub carb_grams: f64,
    pub protein_grams: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyEstimate {
    pub calories: f64,
    pub fat_grams: f64,
    pub carb_grams: f64,
    pub protein_grams: f64,
    pub strategy: EnergyStrategy,
}

/// A weather sample supplied by the wind collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindSample {
    /// m/s
    pub speed: f64,
    /// Degrees, meteorological convention.
    pub direction: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageWind {
    pub speed_mps: f64,
    pub direction_deg: f64,
}

/// Derived energy metrics stored alongside a route. Recomputed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteEnergySummary {
    pub calories_power_based: Option<f64>,
    pub calories_estimated: Option<f64>,
    pub fat_grams: f64,
    pub carb_grams: f64,
    pub protein_grams: f64,
    pub average_power: Option<u16>,
}
