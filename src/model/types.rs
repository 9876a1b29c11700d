use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_new_tokens: Option<usize>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_new_tokens: None,
            temperature: None,
            top_p: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResponse {
    pub generated_text: String,
}

/// Effective sampling parameters handed to a [`Generator`](super::Generator).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
}

impl SamplingParams {
    /// Picks each request value when it is present and non-zero, otherwise
    /// the default. An explicit zero is indistinguishable from "unset".
    pub fn resolve(request: &GenerationRequest, defaults: &SamplingParams) -> Self {
        Self {
            max_new_tokens: request
                .max_new_tokens
                .filter(|v| *v != 0)
                .unwrap_or(defaults.max_new_tokens),
            temperature: request
                .temperature
                .filter(|v| *v != 0.0)
                .unwrap_or(defaults.temperature),
            top_p: request
                .top_p
                .filter(|v| *v != 0.0)
                .unwrap_or(defaults.top_p),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}
