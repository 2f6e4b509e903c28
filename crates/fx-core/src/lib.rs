pub mod error;
pub mod image;
pub mod job;
mod model_types;
pub mod params;

pub use error::{CoreError, Result};
pub use job::{JobHandle, JobStatus};
pub use model_types::{ModelDescriptor, Visibility, catalog};
pub use params::{GenerationParameters, GenerationRequest, normalize};
