use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
};

use anyhow::Context;

pub const DEFAULT_MODEL_ID: &str = "abhinand/tamil-llama-7b-instruct-v0.2";
pub const DEFAULT_MAX_NEW_TOKENS: usize = 512;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_TOP_P: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_id: String,
    pub revision: String,
    pub hf_token: Option<String>,
    /// Root holding one `<model_id>/` directory per servable model.
    pub model_dir: PathBuf,
    pub device: String,
    pub eos_token: Option<String>,
    pub seed: Option<i64>,
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub generation_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            model_id: DEFAULT_MODEL_ID.to_string(),
            revision: "main".to_string(),
            hf_token: None,
            model_dir: PathBuf::from("models"),
            device: "cpu".to_string(),
            eos_token: None,
            seed: None,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            generation_concurrency: 1,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset keys take their
    /// defaults; a numeric key that is set but unparsable is an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr = parse_or(&lookup, "SERVER_ADDR", defaults.listen_addr)?;
        let model_id = lookup("LOCAL_LLM_MODEL").unwrap_or(defaults.model_id);
        let revision = lookup("MODEL_REVISION").unwrap_or(defaults.revision);
        let hf_token = lookup("HF_TOKEN").filter(|token| !token.is_empty());
        let model_dir = lookup("MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_dir);
        let device = lookup("DEVICE").unwrap_or(defaults.device);
        let eos_token = lookup("EOS_TOKEN").filter(|token| !token.is_empty());
        let seed = lookup("GENERATION_SEED")
            .map(|raw| parse_value::<i64>("GENERATION_SEED", &raw))
            .transpose()?;

        let max_new_tokens = parse_or(&lookup, "LOCAL_LLM_MAX_TOKENS", defaults.max_new_tokens)?;
        let temperature = parse_or(&lookup, "LOCAL_LLM_TEMPERATURE", defaults.temperature)?;
        let top_p = parse_or(&lookup, "LOCAL_LLM_TOP_P", defaults.top_p)?;

        let generation_concurrency = parse_or(
            &lookup,
            "GENERATION_CONCURRENCY",
            defaults.generation_concurrency,
        )?;
        anyhow::ensure!(
            generation_concurrency > 0,
            "GENERATION_CONCURRENCY must be at least 1"
        );

        Ok(Self {
            listen_addr,
            model_id,
            revision,
            hf_token,
            model_dir,
            device,
            eos_token,
            seed,
            max_new_tokens,
            temperature,
            top_p,
            generation_concurrency,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_documented_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.max_new_tokens, 512);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.top_p, 0.9);
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.generation_concurrency, 1);
        assert_eq!(config.model_dir, PathBuf::from("models"));
        assert!(config.seed.is_none());
        assert!(config.eos_token.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let config = config_from(&[
            ("LOCAL_LLM_MODEL", "distilgpt2"),
            ("LOCAL_LLM_MAX_TOKENS", "64"),
            ("LOCAL_LLM_TEMPERATURE", "0.7"),
            ("LOCAL_LLM_TOP_P", "0.5"),
            ("SERVER_ADDR", "0.0.0.0:9000"),
            ("DEVICE", "cuda:1"),
            ("MODEL_DIR", "/srv/weights"),
            ("EOS_TOKEN", "<|endoftext|>"),
            ("GENERATION_SEED", "42"),
            ("GENERATION_CONCURRENCY", "2"),
        ])
        .unwrap();

        assert_eq!(config.model_id, "distilgpt2");
        assert_eq!(config.max_new_tokens, 64);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.top_p, 0.5);
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.device, "cuda:1");
        assert_eq!(config.model_dir, PathBuf::from("/srv/weights"));
        assert_eq!(config.eos_token.as_deref(), Some("<|endoftext|>"));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.generation_concurrency, 2);
    }

    #[test]
    fn unparsable_number_is_rejected() {
        let err = config_from(&[("LOCAL_LLM_MAX_TOKENS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("LOCAL_LLM_MAX_TOKENS"));

        assert!(config_from(&[("LOCAL_LLM_TOP_P", "high")]).is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(config_from(&[("GENERATION_CONCURRENCY", "0")]).is_err());
    }
}
