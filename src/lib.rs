//! Activity file decoding (FIT and GPX) and ride energy estimation.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod types;

pub use pipeline::energy::{estimate_energy, summarize_route};
pub use pipeline::normalize::{normalize_coordinate, normalize_coordinates};
pub use pipeline::parse::{decode_fit_file, extract_gpx_coordinates, extract_gpx_trackpoints};
pub use types::activity::{Coordinate, Trackpoint};
