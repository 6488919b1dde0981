//! LoRA adapter references from `--lora-paths`.
//!
//! Each token is either a bare path, which also serves as the adapter name, or
//! a `name=path` pair split on the first `=`. Parsing is independent of the
//! CLI layer so it can be driven from any token source.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ConvertError, Result};
use crate::paths::ResolvedPath;

/// Adapter name to validated adapter path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AdapterMap(BTreeMap<String, ResolvedPath>);

impl AdapterMap {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedPath> {
        self.0.get(name)
    }

    /// Adapters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedPath)> {
        self.0.iter().map(|(name, path)| (name.as_str(), path))
    }
}

/// Split one token into `(name, path)`.
fn split_entry(entry: &str) -> Result<(&str, &str)> {
    let (name, path) = entry.split_once('=').unwrap_or((entry, entry));
    if name.is_empty() {
        return Err(ConvertError::MalformedAdapterEntry {
            entry: entry.to_string(),
            reason: "adapter name is empty".to_string(),
        });
    }
    if path.is_empty() {
        return Err(ConvertError::MalformedAdapterEntry {
            entry: entry.to_string(),
            reason: "adapter path is empty".to_string(),
        });
    }
    Ok((name, path))
}

/// Parse `--lora-paths` tokens.
///
/// `None` means the flag was not given and stays `None`; `Some(&[])` yields an
/// empty map. A later entry with an already-used name replaces the earlier one.
/// Any unresolvable entry fails the whole parse.
pub fn parse_adapter_paths<S: AsRef<str>>(entries: Option<&[S]>) -> Result<Option<AdapterMap>> {
    let Some(entries) = entries else {
        return Ok(None);
    };

    let mut map = BTreeMap::new();
    for entry in entries {
        let entry = entry.as_ref();
        let (name, path) = split_entry(entry)?;
        let resolved =
            ResolvedPath::existing(path).ok_or_else(|| ConvertError::AdapterPathNotFound {
                entry: entry.to_string(),
                path: PathBuf::from(path),
            })?;

        debug!("LoRA adapter {} -> {}", name, resolved);
        if let Some(previous) = map.insert(name.to_string(), resolved) {
            warn!(
                "LoRA adapter name {:?} given more than once; replacing {}",
                name, previous
            );
        }
    }

    Ok(Some(AdapterMap(map)))
}
