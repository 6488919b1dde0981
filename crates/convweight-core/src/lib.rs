//! Convweight Core - input resolution for model weight conversion.
//!
//! Turns the loosely specified arguments of a weight conversion run (paths,
//! `auto` sentinels, adapter lists) into a validated [`JobDescriptor`] and
//! hands it to a conversion engine. Detection of the config file, weight
//! format, model type and device sits behind [`DetectionService`] so callers
//! can swap in their own probes.
//!
//! # Example
//!
//! ```rust,ignore
//! use convweight_core::{AutoDetector, ConversionDispatcher, JobResolver, ManifestEngine, RawInputs};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> convweight_core::Result<()> {
//!     let raw = RawInputs::new("./llama-2-7b", "q4f16_1", "./dist/llama-2-7b-q4f16_1");
//!     let detector = AutoDetector::default();
//!     let job = JobResolver::new(&detector).resolve(&raw)?;
//!
//!     let dispatcher = ConversionDispatcher::new(Arc::new(ManifestEngine));
//!     let report = dispatcher.dispatch(job).await?;
//!     println!("Manifest at {}", report.manifest.display());
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod conversion;
pub mod detect;
pub mod error;
pub mod job;
pub mod paths;
pub mod registry;
pub mod resolver;

// Re-export commonly used types
pub use adapters::{parse_adapter_paths, AdapterMap};
pub use config::{AppConfig, DeviceConfig, EngineConfig, PathsConfig};
pub use conversion::{
    CommandEngine, ConversionDispatcher, ConversionEngine, ConversionReport, ManifestEngine,
};
pub use detect::{
    AutoDetector, DetectedWeight, DetectionService, Device, DeviceHint, DeviceKind, DeviceProbe,
    SystemProbe,
};
pub use error::{ConvertError, Result};
pub use job::{JobDescriptor, JobRequest, RawInputs};
pub use paths::{resolve_input_path, resolve_output_path, ResolvedPath};
pub use registry::{ModelType, Quantization, QuantizationKind, RegistryKey, SourceFormat};
pub use resolver::{resolve_job, JobResolver, ResolutionFailure, ResolutionStage};
