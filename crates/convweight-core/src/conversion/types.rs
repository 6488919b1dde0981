//! Types shared by the conversion engines.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::job::JobDescriptor;
use crate::registry::QuantizationScheme;

/// JSON progress line an external engine emits on stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressLine {
    pub stage: String,
    #[serde(default)]
    pub tensor_index: Option<u32>,
    #[serde(default)]
    pub tensor_count: Option<u32>,
    #[serde(default)]
    pub tensor_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Job manifest written to the output directory before conversion starts.
#[derive(Debug, Serialize)]
pub struct JobManifest<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    /// RFC 3339 timestamp of when the manifest was written
    pub created_at: String,
    /// Full parameters of the requested quantization
    pub scheme: QuantizationScheme,
    pub job: &'a JobDescriptor,
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    /// Engine that handled the job
    pub engine: String,
    pub manifest: PathBuf,
    pub output: PathBuf,
    /// Tensors the engine reported as converted, if it reported any
    pub tensors_converted: Option<u32>,
    pub started_at: String,
    pub finished_at: String,
}
