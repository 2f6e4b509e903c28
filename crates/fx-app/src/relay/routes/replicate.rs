use crate::generator::backend::json_or_error;
use crate::relay::error::{ServerError, ServerResult};
use crate::relay::schemas::RelayRequest;
use crate::relay::state::RelayState;
use axum::Json;
use axum::extract::State;
use serde_json::Value;
use std::sync::Arc;

/// Attaches the caller's key to one upstream call and hands back the JSON as-is.
pub async fn forward(
    State(state): State<Arc<RelayState>>,
    Json(raw): Json<Value>,
) -> ServerResult<Json<Value>> {
    let request: RelayRequest = serde_json::from_value(raw).map_err(|_| {
        ServerError::BadRequest("expected `body` + `modelEndpoint`, `getUrl` or `cancelUrl`".into())
    })?;

    let api_key = request.api_key().trim();
    if api_key.is_empty() {
        return Err(ServerError::MissingApiKey);
    }
    state.check_target(request.target())?;

    let builder = match &request {
        RelayRequest::Submit {
            body,
            model_endpoint,
            ..
        } => state.client.post(model_endpoint).json(body),
        RelayRequest::Status { get_url, .. } => state.client.get(get_url),
        RelayRequest::Cancel { cancel_url, .. } => state.client.post(cancel_url),
    };

    tracing::info!(
        kind = request.kind(),
        target = request.target(),
        "Forwarding to upstream"
    );
    let response = builder
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(|e| ServerError::Unreachable(e.to_string()))?;

    Ok(Json(json_or_error(response).await?))
}
