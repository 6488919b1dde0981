use serde::Serialize;

use super::RegistryKey;
use crate::error::{ConvertError, Result};

/// Family of quantization algorithm a scheme belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuantizationKind {
    NoQuant,
    GroupQuant,
    Awq,
    FtQuant,
    PerTensorQuant,
}

impl QuantizationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantizationKind::NoQuant => "no-quant",
            QuantizationKind::GroupQuant => "group-quant",
            QuantizationKind::Awq => "awq",
            QuantizationKind::FtQuant => "ft-quant",
            QuantizationKind::PerTensorQuant => "per-tensor-quant",
        }
    }
}

impl std::fmt::Display for QuantizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orientation of linear weights after packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeightLayout {
    /// Input features major.
    KN,
    /// Output features major.
    NK,
}

/// Concrete parameters of a registered quantization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantizationScheme {
    pub name: &'static str,
    pub kind: QuantizationKind,
    /// Element type of quantized values (e.g. `int4`, `e4m3_float8`).
    pub quantize_dtype: Option<&'static str>,
    /// Dtype the packed values are stored in.
    pub storage_dtype: Option<&'static str>,
    /// Dtype of the unquantized parts of the model.
    pub model_dtype: &'static str,
    pub group_size: Option<u32>,
    pub weight_layout: Option<WeightLayout>,
    pub quantize_embedding: bool,
    pub quantize_final_fc: bool,
}

impl QuantizationScheme {
    /// Approximate bits per quantized weight, ignoring scales.
    pub fn bits_per_weight(&self) -> f32 {
        match self.quantize_dtype {
            Some("int3") => 3.0,
            Some("int4") => 4.0,
            Some(dtype) if dtype.ends_with("float8") => 8.0,
            _ => match self.model_dtype {
                "float32" => 32.0,
                _ => 16.0,
            },
        }
    }
}

/// Registered quantization identifiers.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Quantization {
    #[serde(rename = "q0f16")]
    Q0f16,
    #[serde(rename = "q0f32")]
    Q0f32,
    #[serde(rename = "q3f16_0")]
    Q3f16_0,
    #[serde(rename = "q3f16_1")]
    Q3f16_1,
    #[serde(rename = "q4f16_0")]
    Q4f16_0,
    #[serde(rename = "q4f16_1")]
    Q4f16_1,
    #[serde(rename = "q4f32_1")]
    Q4f32_1,
    #[serde(rename = "q4f16_2")]
    Q4f16_2,
    #[serde(rename = "q4f16_autoawq")]
    Q4f16_autoawq,
    #[serde(rename = "q4f16_ft")]
    Q4f16_ft,
    #[serde(rename = "e5m2_e5m2_f16")]
    E5m2_e5m2_f16,
    #[serde(rename = "e4m3_e4m3_f16")]
    E4m3_e4m3_f16,
}

const fn group_quant(
    name: &'static str,
    quantize_dtype: &'static str,
    model_dtype: &'static str,
    group_size: u32,
    weight_layout: WeightLayout,
) -> QuantizationScheme {
    QuantizationScheme {
        name,
        kind: QuantizationKind::GroupQuant,
        quantize_dtype: Some(quantize_dtype),
        storage_dtype: Some("uint32"),
        model_dtype,
        group_size: Some(group_size),
        weight_layout: Some(weight_layout),
        quantize_embedding: true,
        quantize_final_fc: true,
    }
}

const fn no_quant(name: &'static str, model_dtype: &'static str) -> QuantizationScheme {
    QuantizationScheme {
        name,
        kind: QuantizationKind::NoQuant,
        quantize_dtype: None,
        storage_dtype: None,
        model_dtype,
        group_size: None,
        weight_layout: None,
        quantize_embedding: false,
        quantize_final_fc: false,
    }
}

const fn per_tensor(name: &'static str, fp8: &'static str) -> QuantizationScheme {
    QuantizationScheme {
        name,
        kind: QuantizationKind::PerTensorQuant,
        quantize_dtype: Some(fp8),
        storage_dtype: Some(fp8),
        model_dtype: "float16",
        group_size: None,
        weight_layout: None,
        quantize_embedding: false,
        quantize_final_fc: false,
    }
}

impl Quantization {
    /// Parse a `--quantization` value.
    pub fn parse(name: &str) -> Result<Self> {
        Self::lookup(name).ok_or_else(|| ConvertError::UnknownQuantization {
            name: name.to_string(),
            choices: Self::choices(),
        })
    }

    /// Resolve the identifier to its parameters.
    pub fn scheme(&self) -> QuantizationScheme {
        use WeightLayout::{KN, NK};
        match self {
            Quantization::Q0f16 => no_quant("q0f16", "float16"),
            Quantization::Q0f32 => no_quant("q0f32", "float32"),
            Quantization::Q3f16_0 => group_quant("q3f16_0", "int3", "float16", 40, KN),
            Quantization::Q3f16_1 => group_quant("q3f16_1", "int3", "float16", 40, NK),
            Quantization::Q4f16_0 => group_quant("q4f16_0", "int4", "float16", 32, KN),
            Quantization::Q4f16_1 => group_quant("q4f16_1", "int4", "float16", 32, NK),
            Quantization::Q4f32_1 => group_quant("q4f32_1", "int4", "float32", 32, NK),
            Quantization::Q4f16_2 => QuantizationScheme {
                quantize_embedding: false,
                quantize_final_fc: false,
                ..group_quant("q4f16_2", "int4", "float16", 32, NK)
            },
            Quantization::Q4f16_autoawq => QuantizationScheme {
                name: "q4f16_autoawq",
                kind: QuantizationKind::Awq,
                quantize_dtype: Some("int4"),
                storage_dtype: Some("uint32"),
                model_dtype: "float16",
                group_size: Some(128),
                weight_layout: None,
                quantize_embedding: false,
                quantize_final_fc: false,
            },
            Quantization::Q4f16_ft => QuantizationScheme {
                name: "q4f16_ft",
                kind: QuantizationKind::FtQuant,
                quantize_dtype: Some("int4"),
                storage_dtype: Some("int8"),
                model_dtype: "float16",
                group_size: None,
                weight_layout: None,
                quantize_embedding: false,
                quantize_final_fc: false,
            },
            Quantization::E5m2_e5m2_f16 => per_tensor("e5m2_e5m2_f16", "e5m2_float8"),
            Quantization::E4m3_e4m3_f16 => per_tensor("e4m3_e4m3_f16", "e4m3_float8"),
        }
    }

    pub fn kind(&self) -> QuantizationKind {
        self.scheme().kind
    }
}

impl RegistryKey for Quantization {
    const ALL: &'static [Self] = &[
        Quantization::Q0f16,
        Quantization::Q0f32,
        Quantization::Q3f16_0,
        Quantization::Q3f16_1,
        Quantization::Q4f16_0,
        Quantization::Q4f16_1,
        Quantization::Q4f32_1,
        Quantization::Q4f16_2,
        Quantization::Q4f16_autoawq,
        Quantization::Q4f16_ft,
        Quantization::E5m2_e5m2_f16,
        Quantization::E4m3_e4m3_f16,
    ];

    fn name(&self) -> &'static str {
        match self {
            Quantization::Q0f16 => "q0f16",
            Quantization::Q0f32 => "q0f32",
            Quantization::Q3f16_0 => "q3f16_0",
            Quantization::Q3f16_1 => "q3f16_1",
            Quantization::Q4f16_0 => "q4f16_0",
            Quantization::Q4f16_1 => "q4f16_1",
            Quantization::Q4f32_1 => "q4f32_1",
            Quantization::Q4f16_2 => "q4f16_2",
            Quantization::Q4f16_autoawq => "q4f16_autoawq",
            Quantization::Q4f16_ft => "q4f16_ft",
            Quantization::E5m2_e5m2_f16 => "e5m2_e5m2_f16",
            Quantization::E4m3_e4m3_f16 => "e4m3_e4m3_f16",
        }
    }
}

impl std::fmt::Display for Quantization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
