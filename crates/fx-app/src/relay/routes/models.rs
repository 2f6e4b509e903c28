use crate::relay::error::{ServerError, ServerResult};
use axum::Json;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use fx_core::{ModelDescriptor, catalog};

/// Static catalog; the key is only checked for presence.
pub async fn list_models(headers: HeaderMap) -> ServerResult<Json<Vec<ModelDescriptor>>> {
    let api_key = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_whitespace().nth(1))
        .filter(|key| !key.trim().is_empty());

    if api_key.is_none() {
        return Err(ServerError::MissingApiKey);
    }

    Ok(Json(catalog()))
}
