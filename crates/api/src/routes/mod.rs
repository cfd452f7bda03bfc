pub mod addresses;
pub mod health;
pub mod pipeline;
pub mod test_alert;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(addresses::router())
        .merge(pipeline::router())
        .merge(test_alert::router())
        .with_state(state)
}
