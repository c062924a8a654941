use crate::{Chw, Device, DeviceSlice, InferError, ModelSpec, Precision};

/// Memory order the backend must assume for a registered input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// Batch, channels, height, width. Inputs are always registered this way;
    /// reconciling a model with a different native order is the backend's job.
    Nchw,
}

impl InputLayout {
    /// Per-sample dims of a registered input, batch axis excluded, in the
    /// order the engine must bind them.
    pub fn sample_dims(&self, shape: Chw) -> Vec<i64> {
        match self {
            InputLayout::Nchw => shape.dims().iter().map(|&d| d as i64).collect(),
        }
    }
}

/// Everything a backend needs to compile one engine.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub spec: &'a ModelSpec,
    pub layout: InputLayout,
    pub max_batch_size: usize,
    pub precision: Precision,
    pub device: &'a Device,
}

/// Model-compilation backend.
pub trait Backend {
    fn name(&self) -> &str;
    fn build(&self, request: &BuildRequest<'_>) -> Result<Box<dyn Engine>, InferError>;
}

/// A compiled, immutable engine.
///
/// Binding dims exclude the implicit batch axis. Element types are reported as
/// ONNX element codes so the resolver can reject types it cannot size.
/// Engines move with their runner, so they must be `Send`.
pub trait Engine: Send {
    fn binding_count(&self) -> usize;
    fn binding_name(&self, index: usize) -> &str;
    fn binding_is_input(&self, index: usize) -> bool;
    fn binding_dims(&self, index: usize) -> Vec<i64>;
    fn binding_data_type(&self, index: usize) -> i32;
    fn max_batch_size(&self) -> usize;

    fn create_execution_context(&mut self) -> Result<Box<dyn ExecutionContext + '_>, InferError>;
}

/// Single-use handle running one batch.
pub trait ExecutionContext {
    /// Run `batch_size` samples over every binding, in binding order. All
    /// device work is complete when this returns.
    fn execute(
        &mut self,
        batch_size: usize,
        bindings: &mut [DeviceSlice<'_>],
    ) -> Result<(), InferError>;
}
