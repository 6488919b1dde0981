//! Model config location and model-type detection.

use std::path::Path;

use tracing::info;

use crate::config::PathsConfig;
use crate::error::{ConvertError, Result};
use crate::paths::ResolvedPath;
use crate::registry::ModelType;

/// Resolve a config reference to the absolute path of its `config.json`.
///
/// A directory must contain `config.json`; a file is used as given.
pub fn detect_config(reference: &str) -> Result<ResolvedPath> {
    let path = Path::new(reference);
    if !path.exists() {
        return Err(ConvertError::PathNotFound {
            role: "Model config",
            path: path.to_path_buf(),
        });
    }

    let config_path = if path.is_dir() {
        let candidate = path.join(PathsConfig::CONFIG_FILE_NAME);
        if !candidate.is_file() {
            return Err(ConvertError::ConfigNotFound(path.to_path_buf()));
        }
        candidate
    } else {
        path.to_path_buf()
    };

    let absolute =
        std::path::absolute(&config_path).map_err(|e| ConvertError::io_with_path(e, &config_path))?;
    info!("Found model configuration: {}", absolute.display());
    Ok(ResolvedPath::detected(absolute))
}

/// Read the `model_type` declared by a config file.
///
/// Some exported configs nest the architecture config under `model_config`.
fn read_config_model_type(config_path: &Path) -> Result<String> {
    let invalid = |message: String| ConvertError::InvalidConfig {
        path: config_path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(config_path)
        .map_err(|e| ConvertError::io_with_path(e, config_path))?;
    let config: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    if !config.is_object() {
        return Err(invalid("expected a JSON object".to_string()));
    }

    let model_type = config
        .get("model_type")
        .or_else(|| config.get("model_config").and_then(|c| c.get("model_type")));

    match model_type {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(format!("'model_type' must be a string, got {other}"))),
        None => Err(ConvertError::ModelTypeMissing(config_path.to_path_buf())),
    }
}

/// Resolve the model architecture.
///
/// An explicit hint wins; otherwise the config's `model_type` is looked up in
/// the registry.
pub fn detect_model_type(hint: Option<ModelType>, config_path: &Path) -> Result<ModelType> {
    if let Some(model_type) = hint {
        return Ok(model_type);
    }

    let declared = read_config_model_type(config_path)?;
    let model_type = ModelType::parse(&declared)?;
    info!(
        "Found model type: {}. Use `--model-type` to override.",
        model_type
    );
    Ok(model_type)
}
