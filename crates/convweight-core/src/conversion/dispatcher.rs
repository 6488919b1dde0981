//! Hands resolved jobs to a conversion engine.

use std::sync::Arc;

use tracing::{error, info};

use super::engine::ConversionEngine;
use super::types::ConversionReport;
use crate::error::Result;
use crate::job::JobDescriptor;

/// Dispatches each job to its engine exactly once.
pub struct ConversionDispatcher {
    engine: Arc<dyn ConversionEngine>,
}

impl ConversionDispatcher {
    pub fn new(engine: Arc<dyn ConversionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Run the conversion for `job`.
    ///
    /// Engine failures are returned unchanged; nothing is retried.
    pub async fn dispatch(&self, job: JobDescriptor) -> Result<ConversionReport> {
        info!(
            "Converting {} weights from {} to {} with {} engine",
            job.model_type,
            job.source,
            job.quantization,
            self.engine.name()
        );
        if let Some(adapters) = &job.lora_paths {
            for (name, path) in adapters.iter() {
                info!("LoRA adapter {}: {}", name, path);
            }
        }

        match self.engine.convert(job).await {
            Ok(report) => {
                info!("Conversion finished, output at {}", report.output.display());
                Ok(report)
            }
            Err(e) => {
                error!("Conversion failed: {}", e);
                Err(e)
            }
        }
    }
}
