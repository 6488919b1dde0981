//! Auto-detection services used by the job resolver.
//!
//! The resolver only talks to [`DetectionService`]. [`AutoDetector`] is the
//! default implementation, backed by the filesystem and a [`DeviceProbe`].

mod config;
mod device;
mod weight;

pub use config::{detect_config, detect_model_type};
pub use device::{detect_device, Device, DeviceHint, DeviceKind, DeviceProbe, SystemProbe};
pub use weight::{detect_weight, DetectedWeight};

use std::path::Path;

use crate::error::Result;
use crate::paths::ResolvedPath;
use crate::registry::{ModelType, SourceFormat};

/// The four detection calls, in the order the resolver makes them.
pub trait DetectionService {
    /// Canonical config file for a config reference.
    fn detect_config(&self, reference: &str) -> Result<ResolvedPath>;

    /// Concrete weights and format under `source`.
    fn detect_weight(
        &self,
        source: &ResolvedPath,
        config_path: &Path,
        hint: Option<SourceFormat>,
    ) -> Result<DetectedWeight>;

    /// Concrete model architecture.
    fn detect_model_type(&self, hint: Option<ModelType>, config_path: &Path) -> Result<ModelType>;

    /// Concrete target device.
    fn detect_device(&self, hint: Option<DeviceHint>) -> Result<Device>;
}

/// Filesystem and hardware backed detection.
pub struct AutoDetector {
    probe: Box<dyn DeviceProbe>,
}

impl AutoDetector {
    pub fn new(probe: Box<dyn DeviceProbe>) -> Self {
        Self { probe }
    }
}

impl Default for AutoDetector {
    fn default() -> Self {
        Self::new(Box::new(SystemProbe::new()))
    }
}

impl DetectionService for AutoDetector {
    fn detect_config(&self, reference: &str) -> Result<ResolvedPath> {
        detect_config(reference)
    }

    fn detect_weight(
        &self,
        source: &ResolvedPath,
        config_path: &Path,
        hint: Option<SourceFormat>,
    ) -> Result<DetectedWeight> {
        detect_weight(source, config_path, hint)
    }

    fn detect_model_type(&self, hint: Option<ModelType>, config_path: &Path) -> Result<ModelType> {
        detect_model_type(hint, config_path)
    }

    fn detect_device(&self, hint: Option<DeviceHint>) -> Result<Device> {
        detect_device(hint, self.probe.as_ref())
    }
}
