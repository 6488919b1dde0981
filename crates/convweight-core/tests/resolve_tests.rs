//! End-to-end resolution tests.
//!
//! These run the full resolver against a real model directory in a temp dir,
//! with a fixed device probe standing in for the hardware.

use std::path::Path;

use convweight_core::{
    resolve_job, AutoDetector, ConvertError, Device, DeviceKind, DeviceProbe, JobResolver,
    ModelType, Quantization, RawInputs, ResolutionStage, SourceFormat,
};
use tempfile::TempDir;

/// Probe that reports a single CUDA GPU.
struct OneGpu;

impl DeviceProbe for OneGpu {
    fn probe(&self, kind: DeviceKind, ordinal: u32) -> Option<Device> {
        (kind == DeviceKind::Cuda && ordinal == 0).then(|| Device {
            kind,
            ordinal,
            name: Some("Test GPU".to_string()),
        })
    }
}

/// Probe for a machine without accelerators.
struct NoGpu;

impl DeviceProbe for NoGpu {
    fn probe(&self, kind: DeviceKind, ordinal: u32) -> Option<Device> {
        (kind == DeviceKind::Cpu).then_some(Device {
            kind,
            ordinal,
            name: None,
        })
    }
}

/// Create a temp dir holding a llama model under `m/` with safetensors weights.
fn create_test_env() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let model_dir = temp_dir.path().join("m");
    std::fs::create_dir_all(&model_dir).unwrap();
    std::fs::write(
        model_dir.join("config.json"),
        r#"{"model_type": "llama", "hidden_size": 4096}"#,
    )
    .unwrap();
    std::fs::write(model_dir.join("model.safetensors"), b"").unwrap();
    temp_dir
}

fn config_ref(temp_dir: &TempDir) -> String {
    temp_dir
        .path()
        .join("m/config.json")
        .to_string_lossy()
        .to_string()
}

fn detector(probe: impl DeviceProbe + 'static) -> AutoDetector {
    AutoDetector::new(Box::new(probe))
}

fn make_adapter(root: &Path, name: &str) -> String {
    let path = root.join(name).join("weights");
    std::fs::create_dir_all(&path).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn test_auto_inputs_resolve_to_concrete_job() {
    let temp_dir = create_test_env();
    let output = temp_dir.path().join("out");
    let raw = RawInputs::new(config_ref(&temp_dir), "q4f16_1", &output);

    let detector = detector(OneGpu);
    let job = JobResolver::new(&detector).resolve(&raw).unwrap();

    assert!(output.is_dir());
    assert_eq!(job.source.as_path(), temp_dir.path().join("m"));
    assert_eq!(job.output.as_path(), output);
    assert_eq!(job.quantization, Quantization::Q4f16_1);
    assert_eq!(job.model_type, ModelType::Llama);
    assert_eq!(job.device.kind, DeviceKind::Cuda);
    assert_eq!(job.source_format, SourceFormat::HuggingfaceSafetensor);
    assert_eq!(job.lora_paths, None);
}

#[test]
fn test_config_directory_reference() {
    let temp_dir = create_test_env();
    let raw = RawInputs::new(
        temp_dir.path().join("m").to_string_lossy(),
        "q0f16",
        temp_dir.path().join("out"),
    );

    let detector = detector(OneGpu);
    let job = JobResolver::new(&detector).resolve(&raw).unwrap();
    assert_eq!(job.config.as_path(), temp_dir.path().join("m/config.json"));
}

#[test]
fn test_named_adapters() {
    let temp_dir = create_test_env();
    let a = make_adapter(temp_dir.path(), "a");
    let b = make_adapter(temp_dir.path(), "b");
    let raw = RawInputs {
        lora_paths: Some(vec![format!("adapterA={a}"), format!("adapterB={b}")]),
        ..RawInputs::new(config_ref(&temp_dir), "q4f16_1", temp_dir.path().join("out"))
    };

    let detector = detector(OneGpu);
    let job = JobResolver::new(&detector).resolve(&raw).unwrap();
    let adapters = job.lora_paths.unwrap();

    assert_eq!(adapters.len(), 2);
    assert_eq!(adapters.get("adapterA").unwrap().as_path(), Path::new(&a));
    assert_eq!(adapters.get("adapterB").unwrap().as_path(), Path::new(&b));
}

#[test]
fn test_empty_adapter_list_is_present() {
    let temp_dir = create_test_env();
    let raw = RawInputs {
        lora_paths: Some(Vec::new()),
        ..RawInputs::new(config_ref(&temp_dir), "q4f16_1", temp_dir.path().join("out"))
    };

    let detector = detector(OneGpu);
    let job = JobResolver::new(&detector).resolve(&raw).unwrap();
    assert_eq!(job.lora_paths.map(|m| m.len()), Some(0));
}

#[test]
fn test_unknown_quantization_fails_before_detection() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("out");
    // The config does not exist; an unknown quantization must be reported first.
    let raw = RawInputs::new("/does/not/exist", "bogus_scheme", &output);

    let detector = detector(OneGpu);
    let failure = JobResolver::new(&detector).resolve(&raw).unwrap_err();

    assert_eq!(failure.stage, ResolutionStage::ParseIdentifiers);
    match &failure.error {
        ConvertError::UnknownQuantization { name, choices } => {
            assert_eq!(name, "bogus_scheme");
            assert!(choices.contains("q4f16_1"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.error.exit_code(), 2);
    assert!(!output.exists());
}

#[test]
fn test_missing_source_creates_no_output() {
    let temp_dir = create_test_env();
    let output = temp_dir.path().join("out");
    let raw = RawInputs {
        source: "/does/not/exist".into(),
        ..RawInputs::new(config_ref(&temp_dir), "q4f16_1", &output)
    };

    let detector = detector(OneGpu);
    let failure = JobResolver::new(&detector).resolve(&raw).unwrap_err();

    assert_eq!(failure.stage, ResolutionStage::ResolveSource);
    assert!(matches!(
        failure.error,
        ConvertError::PathNotFound {
            role: "Model source",
            ..
        }
    ));
    assert!(!output.exists());
}

#[test]
fn test_no_accelerator_fails_auto_device() {
    let temp_dir = create_test_env();
    let output = temp_dir.path().join("out");
    let raw = RawInputs::new(config_ref(&temp_dir), "q4f16_1", &output);

    let detector = detector(NoGpu);
    let failure = JobResolver::new(&detector).resolve(&raw).unwrap_err();
    assert!(matches!(failure.error, ConvertError::NoDeviceAvailable { .. }));
    assert!(!output.exists());

    let raw = RawInputs {
        device: "cpu".into(),
        ..raw
    };
    let job = JobResolver::new(&detector).resolve(&raw).unwrap();
    assert_eq!(job.device.kind, DeviceKind::Cpu);
}

#[test]
fn test_ambiguous_weights_need_a_hint() {
    let temp_dir = create_test_env();
    std::fs::write(temp_dir.path().join("m/pytorch_model.bin"), b"").unwrap();
    let raw = RawInputs::new(config_ref(&temp_dir), "q4f16_1", temp_dir.path().join("out"));

    let detector = detector(OneGpu);
    let failure = JobResolver::new(&detector).resolve(&raw).unwrap_err();
    assert!(matches!(
        failure.error,
        ConvertError::AmbiguousSourceFormat { .. }
    ));

    let raw = RawInputs {
        source_format: "huggingface-torch".into(),
        ..raw
    };
    let job = JobResolver::new(&detector).resolve(&raw).unwrap();
    assert_eq!(job.source_format, SourceFormat::HuggingfaceTorch);
}

#[test]
fn test_explicit_model_type_overrides_config() {
    let temp_dir = create_test_env();
    let raw = RawInputs {
        model_type: "mistral".into(),
        ..RawInputs::new(config_ref(&temp_dir), "q4f16_1", temp_dir.path().join("out"))
    };

    let detector = detector(OneGpu);
    let job = JobResolver::new(&detector).resolve(&raw).unwrap();
    assert_eq!(job.model_type, ModelType::Mistral);
}

#[test]
fn test_lora_only_requires_adapters() {
    let temp_dir = create_test_env();
    let output = temp_dir.path().join("out");
    let raw = RawInputs {
        lora_only: true,
        ..RawInputs::new(config_ref(&temp_dir), "q4f16_1", &output)
    };

    let detector = detector(OneGpu);
    let failure = JobResolver::new(&detector).resolve(&raw).unwrap_err();
    assert!(matches!(failure.error, ConvertError::LoraOnlyWithoutAdapters));
    assert!(!output.exists());
}

#[test]
fn test_resolve_job_returns_plain_error() {
    let temp_dir = create_test_env();
    let detector = detector(OneGpu);

    let raw = RawInputs::new(config_ref(&temp_dir), "q4f16_1", temp_dir.path().join("out"));
    let job = resolve_job(&raw, &detector).unwrap();
    assert_eq!(job.model_type, ModelType::Llama);

    let raw = RawInputs {
        source: "/does/not/exist".into(),
        ..raw
    };
    let err = resolve_job(&raw, &detector).unwrap_err();
    assert!(matches!(err, ConvertError::PathNotFound { .. }));
    assert_eq!(err.exit_code(), 3);
}
