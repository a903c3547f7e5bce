use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::StoreError;
use crate::pipeline::parse::FitDecoder;
use crate::types::activity::StoredRoute;
use crate::types::energy::RouteEnergySummary;

/// Persistence collaborator for decoded routes. Handlers only see this trait,
/// so tests can swap in their own store.
pub trait RouteStore: Send + Sync {
    fn save_route(&self, route: StoredRoute);
    fn get_route(&self, route_id: &str) -> Result<StoredRoute, StoreError>;
    fn set_energy(&self, route_id: &str, summary: RouteEnergySummary) -> Result<(), StoreError>;
    /// Keeps the most recent raw payload per vendor for debugging. Entries
    /// expire with the same TTL as routes.
    fn record_vendor_response(&self, vendor: &str, response: Value);
    fn last_vendor_response(&self, vendor: &str) -> Option<Value>;
    fn evict_expired(&self, ttl: Duration);
}

struct CachedRoute {
    route: StoredRoute,
    inserted_at: Instant,
}

struct CachedResponse {
    response: Value,
    inserted_at: Instant,
}

#[derive(Default)]
pub struct MemoryRouteStore {
    routes: DashMap<String, CachedRoute>,
    vendor_responses: DashMap<String, CachedResponse>,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteStore for MemoryRouteStore {
    fn save_route(&self, route: StoredRoute) {
        self.routes.insert(
            route.route_id.clone(),
            CachedRoute {
                route,
                inserted_at: Instant::now(),
            },
        );
    }

    fn get_route(&self, route_id: &str) -> Result<StoredRoute, StoreError> {
        self.routes
            .get(route_id)
            .map(|entry| entry.route.clone())
            .ok_or_else(|| StoreError::RouteNotFound(route_id.to_string()))
    }

    fn set_energy(&self, route_id: &str, summary: RouteEnergySummary) -> Result<(), StoreError> {
        let mut entry = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| StoreError::RouteNotFound(route_id.to_string()))?;
        entry.route.energy = Some(summary);
        Ok(())
    }

    fn record_vendor_response(&self, vendor: &str, response: Value) {
        self.vendor_responses.insert(
            vendor.to_string(),
            CachedResponse {
                response,
                inserted_at: Instant::now(),
            },
        );
    }

    fn last_vendor_response(&self, vendor: &str) -> Option<Value> {
        self.vendor_responses
            .get(vendor)
            .map(|entry| entry.response.clone())
    }

    fn evict_expired(&self, ttl: Duration) {
        let now = Instant::now();
        self.routes
            .retain(|_, cached| now.duration_since(cached.inserted_at) < ttl);
        self.vendor_responses
            .retain(|_, cached| now.duration_since(cached.inserted_at) < ttl);
        tracing::info!(
            "Route cache eviction complete. Routes: {}, vendor responses: {}",
            self.routes.len(),
            self.vendor_responses.len()
        );
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<dyn RouteStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_store(config, Arc::new(MemoryRouteStore::new()))
    }

    pub fn with_store(config: Config, store: Arc<dyn RouteStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn RouteStore {
        self.store.as_ref()
    }

    pub fn fit_decoder(&self) -> FitDecoder {
        FitDecoder::with_record_limit(self.config.fit_record_limit)
    }
}
