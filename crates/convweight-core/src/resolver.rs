//! Job resolution state machine.
//!
//! Turns [`RawInputs`] into a [`JobDescriptor`] by walking a fixed sequence of
//! stages. Each stage carries forward everything resolved so far and runs only
//! if the previous one succeeded. The first failure ends the run; nothing is
//! retried and no later stage runs, so a failed resolution leaves no output
//! directory behind unless the output stage itself was reached.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::adapters::parse_adapter_paths;
use crate::detect::{DetectedWeight, DetectionService, Device};
use crate::error::{join_choices, ConvertError, Result};
use crate::job::{JobDescriptor, JobRequest, RawInputs};
use crate::paths::{resolve_input_path, resolve_output_path, ResolvedPath};
use crate::registry::{ModelType, QuantizationKind, RegistryKey, SourceFormat};

/// Stages of a resolution run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStage {
    ParseIdentifiers,
    ResolveConfig,
    ResolveSource,
    ResolveModelType,
    ResolveDevice,
    ResolveOutputAndAdapters,
    Assembled,
}

impl ResolutionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStage::ParseIdentifiers => "parse identifiers",
            ResolutionStage::ResolveConfig => "resolve config",
            ResolutionStage::ResolveSource => "resolve source",
            ResolutionStage::ResolveModelType => "resolve model type",
            ResolutionStage::ResolveDevice => "resolve device",
            ResolutionStage::ResolveOutputAndAdapters => "resolve output and adapters",
            ResolutionStage::Assembled => "assembled",
        }
    }
}

impl std::fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failed state: the stage that failed and why.
#[derive(Debug, Error)]
#[error("{stage}: {error}")]
pub struct ResolutionFailure {
    pub stage: ResolutionStage,
    /// Stages that finished before the failure.
    pub completed: Vec<ResolutionStage>,
    pub error: ConvertError,
}

impl From<ResolutionFailure> for ConvertError {
    fn from(failure: ResolutionFailure) -> Self {
        failure.error
    }
}

enum State {
    ResolveConfig {
        request: JobRequest,
    },
    ResolveSource {
        request: JobRequest,
        config: ResolvedPath,
    },
    ResolveModelType {
        request: JobRequest,
        config: ResolvedPath,
        weight: DetectedWeight,
    },
    ResolveDevice {
        request: JobRequest,
        config: ResolvedPath,
        weight: DetectedWeight,
        model_type: ModelType,
    },
    ResolveOutputAndAdapters {
        request: JobRequest,
        config: ResolvedPath,
        weight: DetectedWeight,
        model_type: ModelType,
        device: Device,
    },
}

/// Outcome of one successful step.
enum Next {
    Continue(State),
    Assembled(JobDescriptor),
}

impl State {
    fn stage(&self) -> ResolutionStage {
        match self {
            State::ResolveConfig { .. } => ResolutionStage::ResolveConfig,
            State::ResolveSource { .. } => ResolutionStage::ResolveSource,
            State::ResolveModelType { .. } => ResolutionStage::ResolveModelType,
            State::ResolveDevice { .. } => ResolutionStage::ResolveDevice,
            State::ResolveOutputAndAdapters { .. } => ResolutionStage::ResolveOutputAndAdapters,
        }
    }
}

/// Reject combinations the model or the weights cannot support.
fn check_compatibility(
    model_type: ModelType,
    request: &JobRequest,
    source_format: SourceFormat,
) -> Result<()> {
    let spec = model_type.spec();
    if !spec.supports_format(source_format) {
        return Err(ConvertError::UnsupportedSourceFormat {
            model: model_type.name().to_string(),
            format: source_format.to_string(),
            supported: join_choices(spec.source_formats.iter().map(|f| f.name())),
        });
    }

    let kind = request.quantization.kind();
    if !spec.supports_quantization(kind) {
        return Err(ConvertError::UnsupportedQuantization {
            quantization: request.quantization.name().to_string(),
            reason: format!(
                "model type {} supports {}",
                model_type,
                join_choices(spec.quantization_kinds.iter().map(|k| k.as_str()))
            ),
        });
    }

    let awq_source = source_format == SourceFormat::Awq;
    let awq_quant = kind == QuantizationKind::Awq;
    if awq_source != awq_quant {
        return Err(ConvertError::UnsupportedQuantization {
            quantization: request.quantization.name().to_string(),
            reason: "awq weights and awq quantization must be used together".to_string(),
        });
    }
    Ok(())
}

/// Drives a single resolution run against a set of detectors.
pub struct JobResolver<'a> {
    detectors: &'a dyn DetectionService,
}

impl<'a> JobResolver<'a> {
    pub fn new(detectors: &'a dyn DetectionService) -> Self {
        Self { detectors }
    }

    /// Resolve `raw` into a job descriptor.
    pub fn resolve(&self, raw: &RawInputs) -> std::result::Result<JobDescriptor, ResolutionFailure> {
        let mut completed = Vec::new();

        let request = JobRequest::parse(raw).map_err(|error| ResolutionFailure {
            stage: ResolutionStage::ParseIdentifiers,
            completed: completed.clone(),
            error,
        })?;
        completed.push(ResolutionStage::ParseIdentifiers);

        let mut state = State::ResolveConfig { request };
        loop {
            let stage = state.stage();
            let next = self.step(state).map_err(|error| ResolutionFailure {
                stage,
                completed: completed.clone(),
                error,
            })?;
            debug!("Stage complete: {}", stage);
            completed.push(stage);

            state = match next {
                Next::Continue(state) => state,
                Next::Assembled(job) => {
                    completed.push(ResolutionStage::Assembled);
                    info!(
                        "Resolved job: {} {} on {} -> {}",
                        job.model_type, job.quantization, job.device, job.output
                    );
                    return Ok(job);
                }
            };
        }
    }

    fn step(&self, state: State) -> Result<Next> {
        match state {
            State::ResolveConfig { request } => {
                let config = self.detectors.detect_config(&request.config)?;
                Ok(Next::Continue(State::ResolveSource { request, config }))
            }

            State::ResolveSource { request, config } => {
                let source = resolve_input_path(request.source.as_deref(), config.as_path())?;
                let weight = self.detectors.detect_weight(
                    &source,
                    config.as_path(),
                    request.source_format,
                )?;
                Ok(Next::Continue(State::ResolveModelType {
                    request,
                    config,
                    weight,
                }))
            }

            State::ResolveModelType {
                request,
                config,
                weight,
            } => {
                let model_type = self
                    .detectors
                    .detect_model_type(request.model_type, config.as_path())?;
                check_compatibility(model_type, &request, weight.format)?;
                Ok(Next::Continue(State::ResolveDevice {
                    request,
                    config,
                    weight,
                    model_type,
                }))
            }

            State::ResolveDevice {
                request,
                config,
                weight,
                model_type,
            } => {
                let device = self.detectors.detect_device(request.device)?;
                Ok(Next::Continue(State::ResolveOutputAndAdapters {
                    request,
                    config,
                    weight,
                    model_type,
                    device,
                }))
            }

            State::ResolveOutputAndAdapters {
                request,
                config,
                weight,
                model_type,
                device,
            } => {
                // Adapters first: a bad adapter must not leave an output directory behind.
                let lora_paths = parse_adapter_paths(request.lora_paths.as_deref())?;
                if request.lora_only && lora_paths.as_ref().map_or(true, |m| m.is_empty()) {
                    return Err(ConvertError::LoraOnlyWithoutAdapters);
                }
                let output = resolve_output_path(&request.output)?;

                Ok(Next::Assembled(JobDescriptor {
                    config,
                    quantization: request.quantization,
                    model_type,
                    device,
                    source: weight.path,
                    source_format: weight.format,
                    weight_file: weight.weight_file,
                    output,
                    lora_paths,
                    lora_only: request.lora_only,
                }))
            }
        }
    }
}

/// Resolve `raw` with the given detectors, dropping the stage trace.
pub fn resolve_job(raw: &RawInputs, detectors: &dyn DetectionService) -> Result<JobDescriptor> {
    Ok(JobResolver::new(detectors).resolve(raw)?)
}
