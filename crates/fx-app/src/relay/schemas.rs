use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/replicate`. The variant is chosen by which URL field is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum RelayRequest {
    Submit {
        #[serde(default)]
        api_key: String,
        body: Value,
        model_endpoint: String,
    },
    Status {
        #[serde(default)]
        api_key: String,
        get_url: String,
    },
    Cancel {
        #[serde(default)]
        api_key: String,
        cancel_url: String,
    },
}

impl RelayRequest {
    pub fn api_key(&self) -> &str {
        match self {
            Self::Submit { api_key, .. }
            | Self::Status { api_key, .. }
            | Self::Cancel { api_key, .. } => api_key,
        }
    }

    /// Upstream URL the relay will call.
    pub fn target(&self) -> &str {
        match self {
            Self::Submit { model_endpoint, .. } => model_endpoint,
            Self::Status { get_url, .. } => get_url,
            Self::Cancel { cancel_url, .. } => cancel_url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::Status { .. } => "status",
            Self::Cancel { .. } => "cancel",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}
