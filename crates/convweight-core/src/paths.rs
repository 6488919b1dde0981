//! Path arguments that have already been checked against the filesystem.
//!
//! A [`ResolvedPath`] can only be built by the functions in this crate that
//! perform the check, so code holding one never re-validates it.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ConvertError, Result};

/// A filesystem path that satisfied its precondition when it was resolved.
///
/// Inputs are known to exist. Outputs are known to be directories that exist
/// or were created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    /// Wrap `path` if it exists.
    pub(crate) fn existing(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        path.exists().then_some(Self(path))
    }

    /// Wrap a path handed back by a detector that has already checked it.
    pub(crate) fn detected(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolve the model source argument.
///
/// `None` (the `auto` sentinel) co-locates the source with the config file and
/// returns the config's containing directory. Any other value must exist.
pub fn resolve_input_path(raw: Option<&Path>, config_path: &Path) -> Result<ResolvedPath> {
    let Some(raw) = raw else {
        let parent = match config_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        debug!("Model source co-located with config: {}", parent.display());
        return Ok(ResolvedPath(parent));
    };

    ResolvedPath::existing(raw).ok_or_else(|| ConvertError::PathNotFound {
        role: "Model source",
        path: raw.to_path_buf(),
    })
}

/// Resolve the output argument, creating the directory and its parents when
/// missing.
///
/// An empty path means the current directory. Calling this again on the
/// directory it returned is a no-op.
pub fn resolve_output_path(raw: &Path) -> Result<ResolvedPath> {
    let raw = if raw.as_os_str().is_empty() {
        Path::new(".")
    } else {
        raw
    };
    if raw.is_dir() {
        return Ok(ResolvedPath(raw.to_path_buf()));
    }
    if raw.exists() {
        return Err(ConvertError::PathCreation {
            path: raw.to_path_buf(),
            message: "path exists and is not a directory".to_string(),
            source: None,
        });
    }

    std::fs::create_dir_all(raw).map_err(|e| ConvertError::PathCreation {
        path: raw.to_path_buf(),
        message: e.to_string(),
        source: Some(e),
    })?;
    info!("Created output directory {}", raw.display());
    Ok(ResolvedPath(raw.to_path_buf()))
}
