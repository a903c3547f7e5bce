pub mod activity;
pub mod energy;
