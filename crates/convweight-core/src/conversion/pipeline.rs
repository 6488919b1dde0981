//! Shared helpers for conversion engines.
//!
//! Writing the job manifest, streaming engine output, and checking how the
//! engine process exited.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tracing::{debug, info, warn};

use super::types::{JobManifest, ProgressLine};
use crate::config::{AppConfig, PathsConfig};
use crate::error::{ConvertError, Result};
use crate::job::JobDescriptor;

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Write the job manifest into the job's output directory.
///
/// Returns the manifest path. An existing manifest is overwritten.
pub fn write_manifest(job: &JobDescriptor) -> Result<PathBuf> {
    let manifest = JobManifest {
        tool: AppConfig::APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
        created_at: chrono::Utc::now().to_rfc3339(),
        scheme: job.quantization.scheme(),
        job,
    };

    let path = job.output.as_path().join(PathsConfig::JOB_MANIFEST_FILE);
    let body = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(&path, body).map_err(|e| ConvertError::io_with_path(e, &path))?;
    debug!("Wrote job manifest to {}", path.display());
    Ok(path)
}

// ---------------------------------------------------------------------------
// Engine output streaming
// ---------------------------------------------------------------------------

/// Summary of the progress lines an engine emitted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProgressSummary {
    /// Highest tensor index reported during conversion
    pub tensors_converted: Option<u32>,
    /// Message of the last `error` stage line
    pub error: Option<String>,
}

impl ProgressSummary {
    fn record(&mut self, line: &ProgressLine) {
        match line.stage.as_str() {
            "converting" => {
                if let (Some(index), Some(count)) = (line.tensor_index, line.tensor_count) {
                    info!(
                        "[{}/{}] {}",
                        index,
                        count,
                        line.tensor_name.as_deref().unwrap_or("")
                    );
                }
                if line.tensor_index > self.tensors_converted {
                    self.tensors_converted = line.tensor_index;
                }
            }
            "error" => {
                let message = line.message.clone().unwrap_or_else(|| "unknown error".into());
                warn!("Engine reported an error: {}", message);
                self.error = Some(message);
            }
            stage => {
                info!(
                    "Engine stage: {}{}",
                    stage,
                    line.message
                        .as_deref()
                        .map(|m| format!(" ({m})"))
                        .unwrap_or_default()
                );
            }
        }
    }
}

/// Stream JSON progress lines from an engine's stdout.
///
/// Lines that are not progress JSON are logged at debug level.
pub async fn stream_json_progress(stdout: ChildStdout) -> ProgressSummary {
    let mut summary = ProgressSummary::default();
    let mut reader = BufReader::new(stdout).lines();

    loop {
        match reader.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<ProgressLine>(&line) {
                Ok(progress) => summary.record(&progress),
                Err(_) => debug!("Non-JSON engine output: {}", line),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading engine stdout: {}", e);
                break;
            }
        }
    }
    summary
}

/// Drain an engine's stderr, logging each line at debug level.
pub async fn stream_stderr_lines(process_name: &str, stderr: ChildStderr) {
    let mut reader = BufReader::new(stderr).lines();

    loop {
        match reader.next_line().await {
            Ok(Some(line)) => debug!("[{}] stderr: {}", process_name, line),
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading engine stderr: {}", e);
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Process exit handling
// ---------------------------------------------------------------------------

/// Wait for a child process to exit and return an error on non-zero status.
pub async fn wait_and_check_exit(
    child: &mut tokio::process::Child,
    process_name: &str,
) -> Result<()> {
    let status = child.wait().await.map_err(|e| ConvertError::EngineFailed {
        message: format!("{process_name} process error: {e}"),
    })?;

    if !status.success() {
        return Err(ConvertError::EngineFailed {
            message: format!(
                "{process_name} exited with status: {}",
                status.code().unwrap_or(-1)
            ),
        });
    }
    Ok(())
}

/// Display name of an engine program.
pub fn process_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.display().to_string())
}
