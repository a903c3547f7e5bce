pub mod decode;
pub mod energy;
pub mod health;
pub mod route;
pub mod sync;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(decode::router())
        .merge(route::router())
        .merge(energy::router())
        .merge(sync::router())
}
