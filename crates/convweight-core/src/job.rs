//! Job inputs as given by the user and the fully resolved job descriptor.

use std::path::PathBuf;

use serde::Serialize;

use crate::adapters::AdapterMap;
use crate::config::AppConfig;
use crate::detect::{Device, DeviceHint};
use crate::error::Result;
use crate::paths::ResolvedPath;
use crate::registry::{ModelType, Quantization, SourceFormat};

/// Command-line arguments before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInputs {
    /// Config file or directory containing `config.json`.
    pub config: String,
    pub quantization: String,
    pub model_type: String,
    pub device: String,
    pub source: String,
    pub source_format: String,
    pub output: PathBuf,
    /// `None` when `--lora-paths` was not given at all.
    pub lora_paths: Option<Vec<String>>,
    pub lora_only: bool,
}

impl RawInputs {
    /// Inputs with every optional argument left on its default.
    pub fn new(
        config: impl Into<String>,
        quantization: impl Into<String>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config: config.into(),
            quantization: quantization.into(),
            model_type: AppConfig::AUTO.to_string(),
            device: AppConfig::AUTO.to_string(),
            source: AppConfig::AUTO.to_string(),
            source_format: AppConfig::AUTO.to_string(),
            output: output.into(),
            lora_paths: None,
            lora_only: false,
        }
    }
}

/// Inputs with every identifier checked against its registry.
///
/// `None` stands for `auto`. Building this touches no files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub config: String,
    pub quantization: Quantization,
    pub model_type: Option<ModelType>,
    pub device: Option<DeviceHint>,
    pub source: Option<PathBuf>,
    pub source_format: Option<SourceFormat>,
    pub output: PathBuf,
    pub lora_paths: Option<Vec<String>>,
    pub lora_only: bool,
}

impl JobRequest {
    /// Validate identifiers in `raw`.
    pub fn parse(raw: &RawInputs) -> Result<Self> {
        let quantization = Quantization::parse(&raw.quantization)?;
        let model_type = ModelType::parse_hint(&raw.model_type)?;
        let device = DeviceHint::parse(&raw.device)?;
        let source_format = SourceFormat::parse_hint(&raw.source_format)?;
        let source = (raw.source != AppConfig::AUTO).then(|| PathBuf::from(&raw.source));

        Ok(Self {
            config: raw.config.clone(),
            quantization,
            model_type,
            device,
            source,
            source_format,
            output: raw.output.clone(),
            lora_paths: raw.lora_paths.clone(),
            lora_only: raw.lora_only,
        })
    }
}

/// A weight conversion run with nothing left to detect.
///
/// Built only by the job resolver and consumed by the conversion dispatcher.
#[derive(Debug, PartialEq, Serialize)]
#[non_exhaustive]
pub struct JobDescriptor {
    pub config: ResolvedPath,
    pub quantization: Quantization,
    pub model_type: ModelType,
    pub device: Device,
    pub source: ResolvedPath,
    pub source_format: SourceFormat,
    /// Index or weight file that fixed the source format.
    pub weight_file: PathBuf,
    pub output: ResolvedPath,
    pub lora_paths: Option<AdapterMap>,
    pub lora_only: bool,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::detect::DeviceKind;
    use crate::error::ConvertError;
    use tempfile::TempDir;

    /// A resolved job whose output directory exists under a temp dir.
    pub(crate) fn sample_job() -> (TempDir, JobDescriptor) {
        let temp_dir = TempDir::new().unwrap();
        let model_dir = temp_dir.path().join("m");
        let output_dir = temp_dir.path().join("out");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::create_dir_all(&output_dir).unwrap();

        let job = JobDescriptor {
            config: ResolvedPath::detected(model_dir.join("config.json")),
            quantization: Quantization::Q4f16_1,
            model_type: ModelType::Llama,
            device: Device {
                kind: DeviceKind::Cuda,
                ordinal: 0,
                name: None,
            },
            source: ResolvedPath::detected(model_dir.clone()),
            source_format: SourceFormat::HuggingfaceSafetensor,
            weight_file: model_dir.join("model.safetensors"),
            output: ResolvedPath::detected(output_dir),
            lora_paths: None,
            lora_only: false,
        };
        (temp_dir, job)
    }

    #[test]
    fn test_defaults_parse_to_auto() {
        let raw = RawInputs::new("/m/config.json", "q4f16_1", "/out");
        let request = JobRequest::parse(&raw).unwrap();

        assert_eq!(request.quantization, Quantization::Q4f16_1);
        assert_eq!(request.model_type, None);
        assert_eq!(request.device, None);
        assert_eq!(request.source, None);
        assert_eq!(request.source_format, None);
        assert_eq!(request.lora_paths, None);
    }

    #[test]
    fn test_explicit_values() {
        let raw = RawInputs {
            model_type: "llama".into(),
            device: "cuda:1".into(),
            source: "/weights".into(),
            source_format: "awq".into(),
            ..RawInputs::new("/m", "q4f16_autoawq", "/out")
        };
        let request = JobRequest::parse(&raw).unwrap();

        assert_eq!(request.model_type, Some(ModelType::Llama));
        assert_eq!(
            request.device,
            Some(DeviceHint {
                kind: DeviceKind::Cuda,
                ordinal: 1
            })
        );
        assert_eq!(request.source, Some(PathBuf::from("/weights")));
        assert_eq!(request.source_format, Some(SourceFormat::Awq));
    }

    #[test]
    fn test_quantization_checked_first() {
        let raw = RawInputs {
            model_type: "not-a-model".into(),
            ..RawInputs::new("/m", "bogus_scheme", "/out")
        };
        let err = JobRequest::parse(&raw).unwrap_err();
        assert!(matches!(err, ConvertError::UnknownQuantization { .. }));
    }
}
