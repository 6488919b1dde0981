use serde::Serialize;

use super::{QuantizationKind, RegistryKey, SourceFormat};
use crate::error::{ConvertError, Result};

/// Registered model architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Llama,
    Mistral,
    Mixtral,
    Gemma,
    Gemma2,
    Gpt2,
    GptNeox,
    GptBigcode,
    Phi,
    Phi3,
    Qwen,
    Qwen2,
    Stablelm,
    Baichuan,
    Internlm,
    Internlm2,
    Chatglm,
    Starcoder2,
    Orion,
    Llava,
}

/// What a model architecture can load and how it can be quantized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpec {
    pub name: &'static str,
    pub source_formats: &'static [SourceFormat],
    pub quantization_kinds: &'static [QuantizationKind],
}

impl ModelSpec {
    pub fn supports_format(&self, format: SourceFormat) -> bool {
        self.source_formats.contains(&format)
    }

    pub fn supports_quantization(&self, kind: QuantizationKind) -> bool {
        self.quantization_kinds.contains(&kind)
    }
}

const HF_FORMATS: &[SourceFormat] = &[
    SourceFormat::HuggingfaceTorch,
    SourceFormat::HuggingfaceSafetensor,
];

const HF_AND_AWQ_FORMATS: &[SourceFormat] = &[
    SourceFormat::HuggingfaceTorch,
    SourceFormat::HuggingfaceSafetensor,
    SourceFormat::Awq,
];

const BASIC_QUANT: &[QuantizationKind] = &[
    QuantizationKind::NoQuant,
    QuantizationKind::GroupQuant,
    QuantizationKind::FtQuant,
];

const FULL_QUANT: &[QuantizationKind] = &[
    QuantizationKind::NoQuant,
    QuantizationKind::GroupQuant,
    QuantizationKind::FtQuant,
    QuantizationKind::Awq,
    QuantizationKind::PerTensorQuant,
];

const NO_FT_QUANT: &[QuantizationKind] = &[QuantizationKind::NoQuant, QuantizationKind::GroupQuant];

impl ModelType {
    /// Parse a `--model-type` value. `auto` maps to `None`.
    pub fn parse_hint(hint: &str) -> Result<Option<Self>> {
        if hint == crate::config::AppConfig::AUTO {
            return Ok(None);
        }
        Self::parse(hint).map(Some)
    }

    /// Look up a registered architecture by name.
    pub fn parse(name: &str) -> Result<Self> {
        Self::lookup(name).ok_or_else(|| ConvertError::UnknownModelType {
            name: name.to_string(),
            choices: Self::choices(),
        })
    }

    pub fn spec(&self) -> ModelSpec {
        let name = self.name();
        let (source_formats, quantization_kinds) = match self {
            ModelType::Llama | ModelType::Mistral => (HF_AND_AWQ_FORMATS, FULL_QUANT),
            ModelType::Mixtral => (HF_FORMATS, FULL_QUANT),
            ModelType::Gemma
            | ModelType::Gemma2
            | ModelType::Qwen2
            | ModelType::Phi3
            | ModelType::Starcoder2 => (HF_FORMATS, FULL_QUANT),
            ModelType::Gpt2
            | ModelType::GptNeox
            | ModelType::GptBigcode
            | ModelType::Phi
            | ModelType::Qwen
            | ModelType::Stablelm
            | ModelType::Baichuan
            | ModelType::Internlm
            | ModelType::Internlm2
            | ModelType::Orion => (HF_FORMATS, BASIC_QUANT),
            ModelType::Chatglm | ModelType::Llava => (HF_FORMATS, NO_FT_QUANT),
        };
        ModelSpec {
            name,
            source_formats,
            quantization_kinds,
        }
    }
}

impl RegistryKey for ModelType {
    const ALL: &'static [Self] = &[
        ModelType::Llama,
        ModelType::Mistral,
        ModelType::Mixtral,
        ModelType::Gemma,
        ModelType::Gemma2,
        ModelType::Gpt2,
        ModelType::GptNeox,
        ModelType::GptBigcode,
        ModelType::Phi,
        ModelType::Phi3,
        ModelType::Qwen,
        ModelType::Qwen2,
        ModelType::Stablelm,
        ModelType::Baichuan,
        ModelType::Internlm,
        ModelType::Internlm2,
        ModelType::Chatglm,
        ModelType::Starcoder2,
        ModelType::Orion,
        ModelType::Llava,
    ];

    fn name(&self) -> &'static str {
        match self {
            ModelType::Llama => "llama",
            ModelType::Mistral => "mistral",
            ModelType::Mixtral => "mixtral",
            ModelType::Gemma => "gemma",
            ModelType::Gemma2 => "gemma2",
            ModelType::Gpt2 => "gpt2",
            ModelType::GptNeox => "gpt_neox",
            ModelType::GptBigcode => "gpt_bigcode",
            ModelType::Phi => "phi",
            ModelType::Phi3 => "phi3",
            ModelType::Qwen => "qwen",
            ModelType::Qwen2 => "qwen2",
            ModelType::Stablelm => "stablelm",
            ModelType::Baichuan => "baichuan",
            ModelType::Internlm => "internlm",
            ModelType::Internlm2 => "internlm2",
            ModelType::Chatglm => "chatglm",
            ModelType::Starcoder2 => "starcoder2",
            ModelType::Orion => "orion",
            ModelType::Llava => "llava",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
