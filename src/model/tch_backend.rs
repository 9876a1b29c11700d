use std::time::Instant;

use parking_lot::Mutex;
use tch::{Device, IValue, Kind, Tensor, no_grad};
use tokenizers::{FromPretrainedParameters, Tokenizer};
use tracing::{debug, info};

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{Generator, ModelArtifacts, SamplingParams},
};

const EOS_CANDIDATES: &[&str] = &["</s>", "<|endoftext|>", "<|eot_id|>", "<eos>"];

/// TorchScript causal LM paired with its tokenizer.
pub struct TchGenerator {
    tokenizer: Tokenizer,
    module: Mutex<tch::CModule>,
    device: Device,
    eos_token_id: Option<i64>,
}

impl TchGenerator {
    pub fn load(config: &AppConfig) -> Result<Self, ServiceError> {
        let artifacts = ModelArtifacts::locate(config)?;
        let module_path = artifacts.module_path.as_path();

        let device = parse_device(&config.device);
        if let Some(seed) = config.seed {
            tch::manual_seed(seed);
        }

        let mut module = tch::CModule::load_on_device(module_path, device)
            .map_err(|e| ServiceError::Load(e.to_string()))?;
        module.set_eval();

        let tokenizer = load_tokenizer(config, &artifacts)?;
        let eos_token_id = resolve_eos(&tokenizer, config.eos_token.as_deref())?;

        info!(
            model = %config.model_id,
            module = %module_path.display(),
            ?device,
            ?eos_token_id,
            "generator loaded"
        );

        Ok(Self {
            tokenizer,
            module: Mutex::new(module),
            device,
            eos_token_id,
        })
    }
}

impl Generator for TchGenerator {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Vec<String>, ServiceError> {
        validate_params(params)?;

        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;
        let mut input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        if input_ids.is_empty() {
            input_ids.push(0);
        }
        let prompt_token_len = input_ids.len();

        let start = Instant::now();

        no_grad(|| {
            let module = self.module.lock();

            for _ in 0..params.max_new_tokens {
                let input_tensor = Tensor::from_slice(&input_ids)
                    .reshape([1, input_ids.len() as i64])
                    .to(self.device);

                let output = module
                    .forward_is(&[IValue::Tensor(input_tensor)])
                    .map_err(|e| ServiceError::Inference(e.to_string()))?;

                // traced models return either bare logits or (logits, past)
                let logits = match output {
                    IValue::Tensor(t) => t,
                    IValue::Tuple(ref tuple) if !tuple.is_empty() => match &tuple[0] {
                        IValue::Tensor(t) => t.shallow_clone(),
                        _ => {
                            return Err(ServiceError::Inference(
                                "expected tensor as first tuple element".into(),
                            ));
                        }
                    },
                    _ => {
                        return Err(ServiceError::Inference(
                            "unexpected model output format".into(),
                        ));
                    }
                };

                let next_token_id = sample_next(&logits, params.temperature, params.top_p);
                if Some(next_token_id) == self.eos_token_id {
                    break;
                }
                input_ids.push(next_token_id);
            }

            Ok::<(), ServiceError>(())
        })?;

        let generated_ids: Vec<u32> = input_ids[prompt_token_len..]
            .iter()
            .map(|&id| id as u32)
            .collect();
        let completion = self
            .tokenizer
            .decode(&generated_ids, true)
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;

        debug!(
            tokens_generated = generated_ids.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generation finished"
        );

        Ok(vec![format!("{prompt}{completion}")])
    }
}

/// Samples one token id from `[1, seq_len, vocab]` logits using temperature
/// scaling followed by nucleus filtering.
fn sample_next(logits: &Tensor, temperature: f64, top_p: f64) -> i64 {
    let last = logits.select(1, -1).squeeze().to_kind(Kind::Float);
    let probs = (last / temperature).softmax(-1, Kind::Float);

    let (sorted, indices) = probs.sort(-1, true);
    let cumulative = sorted.cumsum(-1, Kind::Float);
    // a token is dropped once the mass ranked above it already reaches top_p
    let outside = (&cumulative - &sorted).ge(top_p);
    let kept = sorted.masked_fill(&outside, 0.0);

    let choice = kept.multinomial(1, false);
    indices.gather(0, &choice, false).int64_value(&[0])
}

fn validate_params(params: &SamplingParams) -> Result<(), ServiceError> {
    if !params.temperature.is_finite() || params.temperature <= 0.0 {
        return Err(ServiceError::Inference(format!(
            "temperature must be strictly positive, got {}",
            params.temperature
        )));
    }
    if !(params.top_p > 0.0 && params.top_p <= 1.0) {
        return Err(ServiceError::Inference(format!(
            "top_p must be in (0, 1], got {}",
            params.top_p
        )));
    }
    Ok(())
}

fn load_tokenizer(config: &AppConfig, artifacts: &ModelArtifacts) -> Result<Tokenizer, ServiceError> {
    if let Some(path) = artifacts.tokenizer_path.as_deref() {
        return Tokenizer::from_file(path)
            .map_err(|e| ServiceError::Load(format!("tokenizer: {e}")));
    }

    info!(model = %config.model_id, revision = %config.revision, "fetching tokenizer from hub");
    let params = FromPretrainedParameters {
        revision: config.revision.clone(),
        auth_token: config.hf_token.clone(),
        ..Default::default()
    };
    Tokenizer::from_pretrained(&config.model_id, Some(params))
        .map_err(|e| ServiceError::Load(format!("tokenizer: {e}")))
}

fn resolve_eos(tokenizer: &Tokenizer, configured: Option<&str>) -> Result<Option<i64>, ServiceError> {
    if let Some(token) = configured {
        return tokenizer
            .token_to_id(token)
            .map(|id| Some(i64::from(id)))
            .ok_or_else(|| ServiceError::Load(format!("EOS token {token:?} is not in the vocabulary")));
    }
    Ok(EOS_CANDIDATES
        .iter()
        .find_map(|token| tokenizer.token_to_id(token))
        .map(i64::from))
}

fn parse_device(raw: &str) -> Device {
    let lower = raw.to_lowercase();
    if lower.starts_with("cuda") {
        let idx = lower
            .split(':')
            .nth(1)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        if tch::Cuda::is_available() {
            return Device::Cuda(idx);
        }
        tracing::warn!(requested = raw, "CUDA unavailable, falling back to CPU");
    }
    Device::Cpu
}
