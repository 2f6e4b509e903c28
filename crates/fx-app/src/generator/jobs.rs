//! Single-shot job operations. None of these touch controller state; they
//! return values for the controller to apply.

use crate::error::AppError;
use crate::generator::backend::GenerationRelay;
use fx_core::{GenerationParameters, GenerationRequest, JobHandle, JobStatus};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a GenerationParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

/// Builds the `{"input": {...}}` payload for the prediction endpoint.
pub fn build_payload(request: &GenerationRequest, params: &GenerationParameters) -> Value {
    let input = PredictionInput {
        prompt: &request.prompt,
        params,
        image: request.source_image.as_deref(),
    };
    json!({ "input": input })
}

pub async fn submit_job(
    relay: &dyn GenerationRelay,
    api_key: &str,
    model_endpoint: &str,
    request: &GenerationRequest,
    params: &GenerationParameters,
) -> Result<JobHandle, AppError> {
    let payload = build_payload(request, params);
    let body = relay
        .create(api_key, model_endpoint, payload)
        .await
        .map_err(AppError::Submission)?;

    let handle = JobHandle::from_prediction(&body)?;
    tracing::info!(job_id = %handle.id, "Job created");
    Ok(handle)
}

pub async fn poll_job(
    relay: &dyn GenerationRelay,
    api_key: &str,
    handle: &JobHandle,
) -> Result<JobStatus, AppError> {
    let body = relay
        .status(api_key, &handle.status_url)
        .await
        .map_err(AppError::Poll)?;

    Ok(JobStatus::from_prediction(&body)?)
}

pub async fn cancel_job(
    relay: &dyn GenerationRelay,
    api_key: &str,
    handle: &JobHandle,
) -> Result<(), AppError> {
    relay
        .cancel(api_key, &handle.cancel_url)
        .await
        .map_err(AppError::Cancellation)?;

    tracing::info!(job_id = %handle.id, "Upstream cancellation acknowledged");
    Ok(())
}
