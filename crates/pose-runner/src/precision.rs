use crate::InferError;
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// Numeric precision the backend compiles the engine at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    #[serde(alias = "float32")]
    Fp32,
    #[serde(alias = "float16", alias = "half")]
    Fp16,
    Int8,
}

impl Precision {
    /// `true` selects half precision, `false` full precision.
    pub fn from_f16_flag(use_f16: bool) -> Self {
        if use_f16 { Precision::Fp16 } else { Precision::Fp32 }
    }

    pub fn is_reduced(self) -> bool {
        self != Precision::Fp32
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Fp32 => write!(f, "fp32"),
            Precision::Fp16 => write!(f, "fp16"),
            Precision::Int8 => write!(f, "int8"),
        }
    }
}

impl FromStr for Precision {
    type Err = InferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fp32" | "float32" => Ok(Precision::Fp32),
            "fp16" | "float16" | "half" => Ok(Precision::Fp16),
            "int8" => Ok(Precision::Int8),
            other => Err(InferError::Config(format!("unknown precision '{other}'"))),
        }
    }
}
