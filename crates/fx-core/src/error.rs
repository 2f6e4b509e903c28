use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Response is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Unknown job status `{0}`")]
    UnknownStatus(String),

    #[error("Job succeeded without any output")]
    EmptyOutput,

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}
