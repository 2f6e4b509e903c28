use serde::Deserialize;
use serde_json::Value;
use crate::error::{CoreError, Result};

/// Identifies one in-flight upstream job and its lifecycle URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    pub status_url: String,
    pub cancel_url: String,
}

impl JobHandle {
    /// Extracts `id`, `urls.get` and `urls.cancel` from a creation response.
    pub fn from_prediction(body: &Value) -> Result<Self> {
        let prediction: Prediction = serde_json::from_value(body.clone())?;
        let urls = prediction.urls.unwrap_or_default();

        Ok(Self {
            id: non_empty(prediction.id).ok_or(CoreError::MissingField("id"))?,
            status_url: non_empty(urls.get).ok_or(CoreError::MissingField("urls.get"))?,
            cancel_url: non_empty(urls.cancel).ok_or(CoreError::MissingField("urls.cancel"))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded { output_url: String },
    Failed { error: Option<String> },
    Canceled,
}

impl JobStatus {
    /// Maps a status response onto a [`JobStatus`].
    ///
    /// `starting` is reported as [`JobStatus::Queued`]. A `succeeded` response
    /// must carry a non-empty `output` list whose first element is the result.
    pub fn from_prediction(body: &Value) -> Result<Self> {
        let prediction: Prediction = serde_json::from_value(body.clone())?;
        let status = prediction
            .status
            .map(|status| status.trim().to_ascii_lowercase())
            .ok_or(CoreError::MissingField("status"))?;

        match status.as_str() {
            "starting" | "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "succeeded" => {
                let output_url = prediction
                    .output
                    .unwrap_or_default()
                    .into_iter()
                    .next()
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(CoreError::EmptyOutput)?;
                Ok(Self::Succeeded { output_url })
            }
            "failed" => Ok(Self::Failed { error: prediction.error }),
            "canceled" => Ok(Self::Canceled),
            _ => Err(CoreError::UnknownStatus(status)),
        }
    }
}

/// The subset of an upstream prediction object this crate reads.
#[derive(Debug, Default, Deserialize)]
struct Prediction {
    id: Option<String>,
    status: Option<String>,
    urls: Option<PredictionUrls>,
    output: Option<Vec<String>>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
    cancel: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
