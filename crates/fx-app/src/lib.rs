pub mod config;
pub mod credentials;
pub mod error;
pub mod generator;
pub mod job;
pub mod relay;

pub use config::AppConfig;
pub use error::{AppError, ValidationError};
pub use generator::{Generator, GeneratorConfig};
pub use job::{ControllerState, FailureKind, JobFailure};
