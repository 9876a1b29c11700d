use std::path::PathBuf;

use crate::{config::AppConfig, error::ServiceError};

pub const MODULE_FILE: &str = "model.ts";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// On-disk files backing the configured model identifier, laid out as
/// `<model_dir>/<model_id>/{model.ts,tokenizer.json}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifacts {
    pub module_path: PathBuf,
    /// `None` when no local tokenizer ships with the module; the tokenizer is
    /// then fetched from the hub under the same identifier.
    pub tokenizer_path: Option<PathBuf>,
}

impl ModelArtifacts {
    pub fn locate(config: &AppConfig) -> Result<Self, ServiceError> {
        let model_id = config.model_id.as_str();
        if model_id.trim().is_empty() {
            return Err(ServiceError::Load("model identifier must not be empty".into()));
        }

        let mut root = config.model_dir.clone();
        for segment in model_id.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(ServiceError::Load(format!(
                    "invalid model identifier {model_id:?}"
                )));
            }
            root.push(segment);
        }

        let module_path = root.join(MODULE_FILE);
        if !module_path.is_file() {
            return Err(ServiceError::Load(format!(
                "model {model_id:?} not found: missing {}",
                module_path.display()
            )));
        }

        let tokenizer_path = root.join(TOKENIZER_FILE);
        let tokenizer_path = tokenizer_path.is_file().then_some(tokenizer_path);

        Ok(Self {
            module_path,
            tokenizer_path,
        })
    }
}
