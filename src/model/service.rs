use std::sync::Arc;

use tokio::{sync::Semaphore, task};
use tracing::debug;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{Generator, GenerationRequest, GenerationResponse, HealthResponse, SamplingParams},
};

const EMPTY_PROMPT: &str = "Prompt must not be empty";

/// Front door to the shared generator. Cheap to clone.
#[derive(Clone)]
pub struct GenerationService {
    generator: Arc<dyn Generator>,
    model_id: Arc<str>,
    defaults: SamplingParams,
    permits: Arc<Semaphore>,
}

impl GenerationService {
    pub fn new(config: &AppConfig, generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            model_id: Arc::from(config.model_id.as_str()),
            defaults: SamplingParams {
                max_new_tokens: config.max_new_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
            },
            permits: Arc::new(Semaphore::new(config.generation_concurrency)),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
            model: self.model_id.to_string(),
        }
    }

    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ServiceError> {
        if request.prompt.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(EMPTY_PROMPT.into()));
        }

        let params = SamplingParams::resolve(&request, &self.defaults);
        // Moved into the worker: an abandoned request keeps its slot until
        // the backend returns.
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| ServiceError::Inference(format!("generation queue closed: {err}")))?;

        debug!(
            prompt_len = request.prompt.len(),
            max_new_tokens = params.max_new_tokens,
            temperature = params.temperature,
            top_p = params.top_p,
            "starting generation"
        );

        let generator = self.generator.clone();
        let prompt = request.prompt;
        let candidates = task::spawn_blocking(move || {
            let _permit = permit;
            generator.generate(&prompt, &params)
        })
        .await
        .map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))??;

        let generated_text = candidates
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Inference("generator returned no candidates".into()))?;

        Ok(GenerationResponse { generated_text })
    }
}
