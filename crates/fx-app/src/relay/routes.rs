use crate::relay::routes::models::list_models;
use crate::relay::routes::replicate::forward;
use crate::relay::state::RelayState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

mod models;
mod replicate;

pub fn api_routes() -> Router<Arc<RelayState>> {
    Router::new()
        .route("/api/replicate", post(forward))
        .route("/api/replicate/models", get(list_models))
}
