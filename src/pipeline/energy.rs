//! Calorie and macronutrient estimates for a ride.
//!
//! Power-based estimation is preferred; the physics model only runs when no
//! average power is available. Missing wind data means still air, never an error.

use crate::pipeline::process::compute_metrics;
use crate::types::activity::Trackpoint;
use crate::types::energy::{
    AverageWind, EnergyEstimate, EnergyInput, EnergyStrategy, Macronutrients, RouteEnergySummary,
    WindSample,
};

pub const DEFAULT_RIDER_MASS_KG: f64 = 75.0;

const GRAVITY: f64 = 9.8;
const ROLLING_RESISTANCE: f64 = 0.005;
const AIR_DENSITY: f64 = 1.226;
const DRAG_COEFFICIENT: f64 = 0.7;
const FRONTAL_AREA_M2: f64 = 0.5;
const MECHANICAL_EFFICIENCY: f64 = 0.8;
const METABOLIC_EFFICIENCY: f64 = 0.24;
const JOULES_TO_KCAL: f64 = 0.000239;
const SECONDS_PER_DAY: f64 = 86_400.0;

const FAT_SHARE: f64 = 0.30;
const CARB_SHARE: f64 = 0.65;
const PROTEIN_SHARE: f64 = 0.05;
const KCAL_PER_GRAM_FAT: f64 = 9.0;
const KCAL_PER_GRAM_CARB: f64 = 4.0;
const KCAL_PER_GRAM_PROTEIN: f64 = 4.0;

/// `None` means "unavailable", which is distinct from zero calories.
/// The result is not rounded.
pub fn power_based_calories(avg_power_watts: Option<f64>, duration_seconds: f64) -> Option<f64> {
    let power = avg_power_watts.filter(|p| p.is_finite() && *p > 0.0)?;
    if !(duration_seconds > 0.0) {
        return None;
    }
    Some(power * duration_seconds * METABOLIC_EFFICIENCY / 3600.0)
}

/// Physics model over distance, climbing, rolling resistance and drag.
/// Requires a positive distance; a non-positive duration yields zero.
pub fn physics_based_calories(input: &EnergyInput) -> Option<f64> {
    let distance_km = input.distance_km.filter(|d| d.is_finite() && *d > 0.0)?;
    let duration = input.duration_seconds;
    if !(duration > 0.0) {
        return Some(0.0);
    }

    let mass = input.rider_mass_kg.filter(|m| *m > 0.0).unwrap_or(DEFAULT_RIDER_MASS_KG);
    let elevation_gain = input.elevation_gain_m.unwrap_or(0.0);
    let wind_speed = input.wind_speed_mps.unwrap_or(0.0);
    let wind_direction = input.wind_direction_deg.unwrap_or(0.0).to_radians();

    let distance_m = distance_km * 1000.0;
    let avg_speed = distance_m / duration;

    let gravitational = mass * GRAVITY * elevation_gain;
    let rolling = ROLLING_RESISTANCE * mass * GRAVITY * distance_m;

    let headwind = wind_speed * wind_direction.cos();
    let effective_speed = avg_speed + headwind;
    let air = 0.5 * AIR_DENSITY * DRAG_COEFFICIENT * FRONTAL_AREA_M2 * effective_speed.powi(2)
        * distance_m
        / avg_speed;

    let mechanical_energy = (gravitational + rolling + air) / MECHANICAL_EFFICIENCY;
    let work_calories = mechanical_energy * JOULES_TO_KCAL / METABOLIC_EFFICIENCY;
    // Flat per-second BMR proxy, not age/sex adjusted.
    let base_calories = mass * 24.0 * (duration / SECONDS_PER_DAY) * JOULES_TO_KCAL;

    Some((work_calories + base_calories).round())
}

/// Each share is rounded on its own; rounding error is not redistributed.
pub fn macronutrients(calories: f64) -> Macronutrients {
    Macronutrients {
        fat_grams: (calories * FAT_SHARE / KCAL_PER_GRAM_FAT).round(),
        carb_grams: (calories * CARB_SHARE / KCAL_PER_GRAM_CARB).round(),
        protein_grams: (calories * PROTEIN_SHARE / KCAL_PER_GRAM_PROTEIN).round(),
    }
}

pub fn estimate_energy(input: &EnergyInput) -> EnergyEstimate {
    let (calories, strategy) =
        match power_based_calories(input.avg_power_watts, input.duration_seconds) {
            Some(calories) => (calories, EnergyStrategy::PowerBased),
            None => match physics_based_calories(input) {
                Some(calories) => (calories, EnergyStrategy::PhysicsBased),
                None => (0.0, EnergyStrategy::Unavailable),
            },
        };

    let macros = macronutrients(calories);
    EnergyEstimate {
        calories,
        fat_grams: macros.fat_grams,
        carb_grams: macros.carb_grams,
        protein_grams: macros.protein_grams,
        strategy,
    }
}

/// Mean speed and circular-mean direction of the samples. No samples is still air.
pub fn average_wind(samples: &[WindSample]) -> AverageWind {
    let valid: Vec<&WindSample> = samples
        .iter()
        .filter(|s| s.speed.is_finite() && s.direction.is_finite())
        .collect();
    if valid.is_empty() {
        return AverageWind::default();
    }

    let count = valid.len() as f64;
    let speed_mps = valid.iter().map(|s| s.speed).sum::<f64>() / count;
    let sin = valid.iter().map(|s| s.direction.to_radians().sin()).sum::<f64>() / count;
    let cos = valid.iter().map(|s| s.direction.to_radians().cos()).sum::<f64>() / count;

    let direction_deg = if sin.abs() < 1e-9 && cos.abs() < 1e-9 {
        0.0
    } else {
        sin.atan2(cos).to_degrees().rem_euclid(360.0)
    };

    AverageWind {
        speed_mps,
        direction_deg,
    }
}

/// Derives the stored energy summary for a route from its trackpoints.
///
/// Both strategies run on their own; the macronutrient split follows the
/// power-based total when there is one.
pub fn summarize_route(
    points: &[Trackpoint],
    wind: &[WindSample],
    rider_mass_kg: Option<f64>,
) -> RouteEnergySummary {
    let metrics = compute_metrics(points);
    let wind = average_wind(wind);

    let input = EnergyInput {
        avg_power_watts: metrics.avg_power.map(f64::from),
        duration_seconds: metrics.duration_seconds as f64,
        distance_km: Some(metrics.distance_km),
        elevation_gain_m: Some(metrics.elevation_gain_m),
        rider_mass_kg,
        wind_speed_mps: Some(wind.speed_mps),
        wind_direction_deg: Some(wind.direction_deg),
    };
    let power_based = power_based_calories(input.avg_power_watts, input.duration_seconds);
    let estimated = physics_based_calories(&input);
    let macros = macronutrients(power_based.or(estimated).unwrap_or(0.0));

    tracing::debug!(
        "Route energy: power-based {:?}, estimated {:?} ({:.2} km, {} s)",
        power_based,
        estimated,
        metrics.distance_km,
        metrics.duration_seconds
    );

    RouteEnergySummary {
        calories_power_based: power_based,
        calories_estimated: estimated,
        fat_grams: macros.fat_grams,
        carb_grams: macros.carb_grams,
        protein_grams: macros.protein_grams,
        average_power: metrics.avg_power,
    }
}
