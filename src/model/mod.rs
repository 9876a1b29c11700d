mod artifacts;
mod service;
mod types;

#[cfg(feature = "tch-backend")]
pub mod tch_backend;

use std::sync::Arc;

use crate::{config::AppConfig, error::ServiceError};

pub use artifacts::ModelArtifacts;
pub use service::GenerationService;
pub use types::{GenerationRequest, GenerationResponse, HealthResponse, SamplingParams};

/// A loaded model and tokenizer able to produce text continuations.
///
/// Implementations are shared read-only across requests and are called from
/// blocking worker threads, never from the async runtime directly.
pub trait Generator: Send + Sync {
    /// Runs one sampled generation and returns the produced candidates.
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Vec<String>, ServiceError>;
}

/// Acquires the generator compiled into this build.
#[cfg(feature = "tch-backend")]
pub fn load_generator(config: &AppConfig) -> Result<Arc<dyn Generator>, ServiceError> {
    let generator = tch_backend::TchGenerator::load(config)?;
    Ok(Arc::new(generator))
}

#[cfg(not(feature = "tch-backend"))]
pub fn load_generator(_config: &AppConfig) -> Result<Arc<dyn Generator>, ServiceError> {
    Err(ServiceError::Load(
        "no generation backend compiled in; enable the `tch-backend` feature".into(),
    ))
}
