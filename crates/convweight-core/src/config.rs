//! Centralized configuration for convweight.
//!
//! File names that drive auto-detection, engine timing, and the device kinds
//! probed when the user leaves `--device` on `auto`.

use std::time::Duration;

use crate::detect::DeviceKind;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "convweight";
    /// Sentinel accepted by `--model-type`, `--device`, `--source` and `--source-format`.
    pub const AUTO: &'static str = "auto";
    /// Environment variable naming the external converter program.
    pub const ENGINE_ENV: &'static str = "CONVWEIGHT_ENGINE";
}

/// File names inspected during detection.
pub struct PathsConfig;

impl PathsConfig {
    pub const CONFIG_FILE_NAME: &'static str = "config.json";
    pub const TORCH_INDEX_FILE: &'static str = "pytorch_model.bin.index.json";
    pub const TORCH_SINGLE_FILE: &'static str = "pytorch_model.bin";
    pub const SAFETENSORS_INDEX_FILE: &'static str = "model.safetensors.index.json";
    pub const SAFETENSORS_SINGLE_FILE: &'static str = "model.safetensors";
    pub const AWQ_EXTENSIONS: &'static [&'static str] = &["pt", "safetensors"];
    pub const JOB_MANIFEST_FILE: &'static str = "convweight-job.json";
}

/// Device probing configuration.
pub struct DeviceConfig;

impl DeviceConfig {
    /// Probe order for `--device auto`. The first present kind wins.
    pub const AUTO_DETECT_ORDER: &'static [DeviceKind] = &[
        DeviceKind::Cuda,
        DeviceKind::Rocm,
        DeviceKind::Metal,
        DeviceKind::Vulkan,
        DeviceKind::OpenCl,
    ];
}

/// Conversion engine configuration.
pub struct EngineConfig;

impl EngineConfig {
    /// Upper bound on a single conversion run.
    pub const ENGINE_RUN_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);
}
