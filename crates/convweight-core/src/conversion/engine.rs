//! Conversion engines.
//!
//! An engine receives a fully resolved [`JobDescriptor`] and performs the
//! conversion. [`ManifestEngine`] only records the job; [`CommandEngine`]
//! hands it to an external program.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use super::pipeline::{self, ProgressSummary};
use super::types::ConversionReport;
use crate::config::EngineConfig;
use crate::error::{ConvertError, Result};
use crate::job::JobDescriptor;

/// Performs the conversion described by a job.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Human-readable engine name.
    fn name(&self) -> &str;

    /// Convert the weights described by `job`.
    async fn convert(&self, job: JobDescriptor) -> Result<ConversionReport>;
}

/// Writes the job manifest and stops.
///
/// Used for dry runs and when no external engine is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestEngine;

#[async_trait]
impl ConversionEngine for ManifestEngine {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn convert(&self, job: JobDescriptor) -> Result<ConversionReport> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let manifest = pipeline::write_manifest(&job)?;
        info!("Job manifest written to {}", manifest.display());

        Ok(ConversionReport {
            engine: self.name().to_string(),
            manifest,
            output: job.output.into_path_buf(),
            tensors_converted: None,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Runs an external program on the job manifest.
///
/// The program is invoked as `<program> [args...] <manifest>` and may report
/// progress as JSON lines on stdout.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: EngineConfig::ENGINE_RUN_TIMEOUT,
        }
    }

    /// Add an argument placed before the manifest path.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, manifest: &std::path::Path, name: &str) -> Result<ProgressSummary> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(manifest)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ConvertError::EngineFailed {
                message: format!("Failed to spawn {name}: {e}"),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| ConvertError::EngineFailed {
            message: format!("{name} stdout was not captured"),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ConvertError::EngineFailed {
            message: format!("{name} stderr was not captured"),
        })?;

        let (summary, ()) = tokio::join!(
            pipeline::stream_json_progress(stdout),
            pipeline::stream_stderr_lines(name, stderr)
        );

        if let Err(err) = pipeline::wait_and_check_exit(&mut child, name).await {
            return Err(match &summary.error {
                Some(reported) => ConvertError::EngineFailed {
                    message: format!("{err}: {reported}"),
                },
                None => err,
            });
        }
        Ok(summary)
    }
}

#[async_trait]
impl ConversionEngine for CommandEngine {
    fn name(&self) -> &str {
        "command"
    }

    async fn convert(&self, job: JobDescriptor) -> Result<ConversionReport> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let manifest = pipeline::write_manifest(&job)?;
        let name = pipeline::process_name(&self.program);
        info!("Running {} on {}", name, manifest.display());

        let summary = tokio::time::timeout(self.timeout, self.run(&manifest, &name))
            .await
            .map_err(|_| ConvertError::EngineFailed {
                message: format!("{name} did not finish within {:?}", self.timeout),
            })??;

        info!("{} finished", name);
        Ok(ConversionReport {
            engine: name,
            manifest,
            output: job.output.into_path_buf(),
            tensors_converted: summary.tensors_converted,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;

    #[tokio::test]
    async fn test_manifest_engine_writes_manifest() {
        let (temp_dir, job) = crate::job::tests::sample_job();

        let report = ManifestEngine.convert(job).await.unwrap();
        let manifest = temp_dir.path().join("out").join(PathsConfig::JOB_MANIFEST_FILE);
        assert_eq!(report.manifest, manifest);
        assert_eq!(report.engine, "manifest");

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&manifest).unwrap()).unwrap();
        assert_eq!(value["job"]["quantization"], "q4f16_1");
        assert_eq!(value["job"]["model_type"], "llama");
        assert_eq!(value["scheme"]["group_size"], 32);
        assert!(value["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let (_temp_dir, job) = crate::job::tests::sample_job();
        let engine = CommandEngine::new("/does/not/exist/convert-engine");

        let err = engine.convert(job).await.unwrap_err();
        match err {
            ConvertError::EngineFailed { message } => assert!(message.contains("Failed to spawn")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_engine_reads_progress() {
        let (_temp_dir, job) = crate::job::tests::sample_job();
        let script = r#"test -f "$0" || exit 9
echo '{"stage": "converting", "tensor_index": 1, "tensor_count": 2, "tensor_name": "a"}'
echo 'plain text'
echo '{"stage": "converting", "tensor_index": 2, "tensor_count": 2, "tensor_name": "b"}'
echo 'warning' >&2"#;
        let engine = CommandEngine::new("sh").arg("-c").arg(script);

        let report = engine.convert(job).await.unwrap();
        assert_eq!(report.engine, "sh");
        assert_eq!(report.tensors_converted, Some(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_engine_nonzero_exit() {
        let (_temp_dir, job) = crate::job::tests::sample_job();
        let script = r#"echo '{"stage": "error", "message": "unsupported tensor"}'; exit 3"#;
        let engine = CommandEngine::new("sh").arg("-c").arg(script);

        let err = engine.convert(job).await.unwrap_err();
        match err {
            ConvertError::EngineFailed { message } => {
                assert!(message.contains("status: 3"));
                assert!(message.contains("unsupported tensor"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_engine_timeout() {
        let (_temp_dir, job) = crate::job::tests::sample_job();
        let engine = CommandEngine::new("sh")
            .arg("-c")
            .arg("sleep 5")
            .with_timeout(Duration::from_millis(100));

        let err = engine.convert(job).await.unwrap_err();
        match err {
            ConvertError::EngineFailed { message } => assert!(message.contains("did not finish")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
