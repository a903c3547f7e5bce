use std::time::Duration;

use crate::pipeline::energy::DEFAULT_RIDER_MASS_KG;
use crate::pipeline::parse::fit::DEFAULT_RECORD_LIMIT;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub max_file_size: usize,
    pub cache_ttl: Duration,
    pub fit_record_limit: usize,
    pub default_rider_mass_kg: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            max_file_size: 25 * 1024 * 1024,
            cache_ttl: Duration::from_secs(3600),
            fit_record_limit: DEFAULT_RECORD_LIMIT,
            default_rider_mass_kg: DEFAULT_RIDER_MASS_KG,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let max_file_size = env_parse::<usize>("MAX_FILE_SIZE_MB")
            .map(|mb| mb * 1024 * 1024)
            .unwrap_or(defaults.max_file_size);

        let cache_ttl = env_parse("CACHE_TTL_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let fit_record_limit = env_parse::<usize>("FIT_RECORD_LIMIT")
            .filter(|limit| *limit > 0)
            .unwrap_or(defaults.fit_record_limit);

        let default_rider_mass_kg = env_parse::<f64>("DEFAULT_RIDER_MASS_KG")
            .filter(|mass| mass.is_finite() && *mass > 0.0)
            .unwrap_or(defaults.default_rider_mass_kg);

        Self {
            port,
            max_file_size,
            cache_ttl,
            fit_record_limit,
            default_rider_mass_kg,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
