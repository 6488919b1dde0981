//! Source weight format detection.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::PathsConfig;
use crate::error::{join_choices, ConvertError, Result};
use crate::paths::ResolvedPath;
use crate::registry::{RegistryKey, SourceFormat};

/// Weights located for a source path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedWeight {
    /// The source path the weights were found under.
    pub path: ResolvedPath,
    pub format: SourceFormat,
    /// Index file or single weight file that identifies the format.
    pub weight_file: PathBuf,
}

fn first_file(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|n| dir.join(n)).find(|p| p.is_file())
}

/// Locate the file that marks `dir` as holding `format` weights.
fn find_format_file(dir: &Path, format: SourceFormat) -> Option<PathBuf> {
    match format {
        SourceFormat::HuggingfaceTorch => first_file(
            dir,
            &[PathsConfig::TORCH_INDEX_FILE, PathsConfig::TORCH_SINGLE_FILE],
        ),
        SourceFormat::HuggingfaceSafetensor => first_file(
            dir,
            &[
                PathsConfig::SAFETENSORS_INDEX_FILE,
                PathsConfig::SAFETENSORS_SINGLE_FILE,
            ],
        ),
        SourceFormat::Awq => {
            let mut checkpoints: Vec<PathBuf> = WalkDir::new(dir)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| PathsConfig::AWQ_EXTENSIONS.contains(&ext))
                })
                .collect();
            checkpoints.sort();
            checkpoints.into_iter().next()
        }
    }
}

/// Infer the format of a single weight file from its name.
fn format_of_file(file: &Path) -> Option<SourceFormat> {
    let name = file.file_name()?.to_str()?;
    if name.ends_with(".safetensors") || name.ends_with(".safetensors.index.json") {
        Some(SourceFormat::HuggingfaceSafetensor)
    } else if name.ends_with(".bin") || name.ends_with(".bin.index.json") {
        Some(SourceFormat::HuggingfaceTorch)
    } else if name.ends_with(".pt") {
        Some(SourceFormat::Awq)
    } else {
        None
    }
}

/// Check that every shard an index file references is on disk.
fn validate_index(index: &Path) -> Result<()> {
    if !index
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".index.json"))
    {
        return Ok(());
    }

    let invalid = |message: String| ConvertError::InvalidWeightIndex {
        path: index.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(index).map_err(|e| ConvertError::io_with_path(e, index))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    let weight_map = value
        .get("weight_map")
        .and_then(|v| v.as_object())
        .ok_or_else(|| invalid("missing weight_map".to_string()))?;

    let shards: BTreeSet<&str> = weight_map.values().filter_map(|v| v.as_str()).collect();
    let base = index.parent().unwrap_or(Path::new("."));
    let missing: Vec<&str> = shards
        .iter()
        .copied()
        .filter(|shard| !base.join(shard).is_file())
        .collect();

    if !missing.is_empty() {
        return Err(ConvertError::MissingWeightShards {
            index: index.to_path_buf(),
            missing: join_choices(missing),
        });
    }
    debug!("Weight index {} lists {} shard(s)", index.display(), shards.len());
    Ok(())
}

fn detect_in_file(file: &Path, hint: Option<SourceFormat>) -> Result<(SourceFormat, PathBuf)> {
    let inferred = format_of_file(file);
    let format = match (hint, inferred) {
        (Some(hint), Some(inferred)) if hint == inferred => hint,
        // .safetensors files are also valid AWQ checkpoints.
        (Some(SourceFormat::Awq), Some(SourceFormat::HuggingfaceSafetensor)) => SourceFormat::Awq,
        (Some(hint), _) => {
            return Err(ConvertError::SourceFormatMismatch {
                path: file.to_path_buf(),
                format: hint.to_string(),
            })
        }
        (None, Some(inferred)) if inferred.auto_detectable() => inferred,
        (None, _) => return Err(ConvertError::SourceFormatNotDetected(file.to_path_buf())),
    };
    Ok((format, file.to_path_buf()))
}

fn detect_in_dir(dir: &Path, hint: Option<SourceFormat>) -> Result<(SourceFormat, PathBuf)> {
    if let Some(format) = hint {
        let file = find_format_file(dir, format).ok_or_else(|| {
            ConvertError::SourceFormatMismatch {
                path: dir.to_path_buf(),
                format: format.to_string(),
            }
        })?;
        return Ok((format, file));
    }

    let mut candidates: Vec<(SourceFormat, PathBuf)> = SourceFormat::ALL
        .iter()
        .copied()
        .filter(SourceFormat::auto_detectable)
        .filter_map(|format| find_format_file(dir, format).map(|file| (format, file)))
        .collect();

    if candidates.len() > 1 {
        let names = join_choices(candidates.iter().map(|(f, _)| f.name()));
        warn!("Multiple weight formats under {}: {}", dir.display(), names);
        return Err(ConvertError::AmbiguousSourceFormat {
            path: dir.to_path_buf(),
            candidates: names,
        });
    }
    candidates
        .pop()
        .ok_or_else(|| ConvertError::SourceFormatNotDetected(dir.to_path_buf()))
}

/// Resolve the source weights and their format.
///
/// `source` may be a directory or a single weight file. With no hint the
/// format must be unique among the auto-detectable formats.
pub fn detect_weight(
    source: &ResolvedPath,
    config_path: &Path,
    hint: Option<SourceFormat>,
) -> Result<DetectedWeight> {
    let path = source.as_path();
    let (format, weight_file) = if path.is_dir() {
        detect_in_dir(path, hint)?
    } else {
        detect_in_file(path, hint)?
    };
    validate_index(&weight_file)?;

    info!(
        "Found source weight format: {} ({}) for config {}",
        format,
        weight_file.display(),
        config_path.display()
    );
    Ok(DetectedWeight {
        path: source.clone(),
        format,
        weight_file,
    })
}
