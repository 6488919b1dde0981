use serde::{Deserialize, Serialize};

use super::RegistryKey;
use crate::error::{ConvertError, Result};

/// On-disk layout of the source weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    #[serde(rename = "huggingface-torch")]
    HuggingfaceTorch,
    #[serde(rename = "huggingface-safetensor")]
    HuggingfaceSafetensor,
    #[serde(rename = "awq")]
    Awq,
}

impl SourceFormat {
    /// Parse a `--source-format` value. `auto` maps to `None`.
    pub fn parse_hint(hint: &str) -> Result<Option<Self>> {
        if hint == crate::config::AppConfig::AUTO {
            return Ok(None);
        }
        Self::lookup(hint)
            .map(Some)
            .ok_or_else(|| ConvertError::UnknownSourceFormat {
                name: hint.to_string(),
                choices: format!("auto, {}", Self::choices()),
            })
    }

    /// Formats tried when the user leaves the format on `auto`.
    ///
    /// AWQ checkpoints look like ordinary safetensors/pt files and are only
    /// used when asked for.
    pub fn auto_detectable(&self) -> bool {
        !matches!(self, SourceFormat::Awq)
    }
}

impl RegistryKey for SourceFormat {
    const ALL: &'static [Self] = &[
        SourceFormat::HuggingfaceTorch,
        SourceFormat::HuggingfaceSafetensor,
        SourceFormat::Awq,
    ];

    fn name(&self) -> &'static str {
        match self {
            SourceFormat::HuggingfaceTorch => "huggingface-torch",
            SourceFormat::HuggingfaceSafetensor => "huggingface-safetensor",
            SourceFormat::Awq => "awq",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
