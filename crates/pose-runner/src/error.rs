use crate::{Direction, Precision};
use std::fmt;

#[derive(Debug)]
pub enum InferError {
    /// The backend could not compile the model.
    EngineBuild { precision: Precision, reason: String },
    /// A binding uses an element type outside f32 / f16 / i8.
    UnsupportedDataType { binding: String, code: i32 },
    /// The declared inputs/outputs are malformed or disagree with the engine.
    InvalidSpec(String),
    InvalidBatch { batch_size: usize, max_batch_size: usize },
    BindingMismatch { direction: Direction, expected: usize, got: usize },
    /// A buffer was requested for a binding index the engine does not have.
    InvalidBindingIndex { index: usize, count: usize },
    BufferTooSmall { binding: String, need: usize, have: usize },
    Device(String),
    Backend(String),
    UnknownBackend(String),
    Config(String),
    Io(String),
}

impl fmt::Display for InferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferError::EngineBuild { precision, reason } => {
                write!(f, "failed to create engine of data type {precision}: {reason}")
            }
            InferError::UnsupportedDataType { binding, code } => {
                write!(f, "binding '{binding}' has unsupported element type {code}")
            }
            InferError::InvalidSpec(msg) => write!(f, "invalid model spec: {msg}"),
            InferError::InvalidBatch {
                batch_size,
                max_batch_size,
            } => write!(
                f,
                "invalid batch size {batch_size} (must be between 1 and {max_batch_size})"
            ),
            InferError::BindingMismatch {
                direction,
                expected,
                got,
            } => write!(f, "expected {expected} {direction} buffers, got {got}"),
            InferError::InvalidBindingIndex { index, count } => {
                write!(f, "binding index {index} out of range (engine has {count} bindings)")
            }
            InferError::BufferTooSmall { binding, need, have } => write!(
                f,
                "host buffer for '{binding}' too small: need {need} bytes, have {have}"
            ),
            InferError::Device(msg) => write!(f, "device error: {msg}"),
            InferError::Backend(msg) => write!(f, "backend error: {msg}"),
            InferError::UnknownBackend(name) => write!(f, "unknown backend: {name}"),
            InferError::Config(msg) => write!(f, "config error: {msg}"),
            InferError::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl std::error::Error for InferError {}

impl From<std::io::Error> for InferError {
    fn from(err: std::io::Error) -> Self {
        InferError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for InferError {
    fn from(err: serde_json::Error) -> Self {
        InferError::Config(err.to_string())
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for InferError {
    fn from(err: ort::Error) -> Self {
        InferError::Backend(err.to_string())
    }
}
