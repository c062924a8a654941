use std::fmt;

// ONNX TensorProto element codes, shared by every backend's binding metadata.
pub const CODE_FLOAT32: i32 = 1;
pub const CODE_INT8: i32 = 3;
pub const CODE_FLOAT16: i32 = 10;

/// Element types a binding may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Float32,
    Float16,
    Int8,
}

impl DataType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            CODE_FLOAT32 => Some(DataType::Float32),
            CODE_FLOAT16 => Some(DataType::Float16),
            CODE_INT8 => Some(DataType::Int8),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            DataType::Float32 => CODE_FLOAT32,
            DataType::Float16 => CODE_FLOAT16,
            DataType::Int8 => CODE_INT8,
        }
    }

    pub fn size(self) -> usize {
        match self {
            DataType::Float32 => 4,
            DataType::Float16 => 2,
            DataType::Int8 => 1,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Float32 => write!(f, "float32"),
            DataType::Float16 => write!(f, "float16"),
            DataType::Int8 => write!(f, "int8"),
        }
    }
}
