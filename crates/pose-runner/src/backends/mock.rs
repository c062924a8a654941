//! In-process backend driven by a small JSON model description.
//!
//! ```json
//! {
//!   "inputs": [{ "name": "image" }],
//!   "outputs": [
//!     { "name": "outputs/conf", "dims": [19, 32, 24] },
//!     { "name": "outputs/paf", "dims": [38, 32, 24] }
//!   ],
//!   "op": "echo"
//! }
//! ```
//!
//! Input dims come from the registered CHW shape in the requested layout. `echo` fills every output
//! row with the bytes of the matching row of the first input, repeated or
//! truncated to fit; `fail` makes every execution return an error.

use crate::dtype::CODE_FLOAT32;
use crate::{Backend, BuildRequest, DeviceSlice, Engine, ExecutionContext, InferError};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};

fn default_code() -> i32 {
    CODE_FLOAT32
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockInput {
    pub name: String,
    #[serde(default = "default_code")]
    pub data_type: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockOutput {
    pub name: String,
    pub dims: Vec<i64>,
    #[serde(default = "default_code")]
    pub data_type: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockOp {
    #[default]
    Echo,
    Fail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockModel {
    pub inputs: Vec<MockInput>,
    pub outputs: Vec<MockOutput>,
    #[serde(default)]
    pub op: MockOp,
    /// Largest batch the "compiled" engine accepts; defaults to the request.
    #[serde(default)]
    pub max_batch_size: Option<usize>,
}

/// Counters shared by every engine a [`MockBackend`] builds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    pub engines_built: usize,
    pub contexts_created: usize,
    pub live_contexts: usize,
    pub executions: usize,
    pub last_batch_size: Option<usize>,
}

#[derive(Debug, Default, Clone)]
pub struct MockBackend {
    stats: Arc<Mutex<MockStats>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> MockStats {
        lock(&self.stats).clone()
    }
}

fn lock(stats: &Mutex<MockStats>) -> MutexGuard<'_, MockStats> {
    // counters stay usable after a panicking test thread
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct MockBinding {
    name: String,
    is_input: bool,
    dims: Vec<i64>,
    data_type: i32,
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn build(&self, request: &BuildRequest<'_>) -> Result<Box<dyn Engine>, InferError> {
        let path = request.spec.model_path();
        let text = std::fs::read_to_string(path).map_err(|e| {
            InferError::Backend(format!("cannot read model '{}': {e}", path.display()))
        })?;
        let model: MockModel = serde_json::from_str(&text).map_err(|e| {
            InferError::Backend(format!("cannot parse model '{}': {e}", path.display()))
        })?;

        let mut bindings = Vec::new();
        for input in &model.inputs {
            let declared = request.spec.input(&input.name).ok_or_else(|| {
                InferError::Backend(format!("model input '{}' was not registered", input.name))
            })?;
            bindings.push(MockBinding {
                name: input.name.clone(),
                is_input: true,
                dims: request.layout.sample_dims(declared.shape),
                data_type: input.data_type,
            });
        }
        for declared in request.spec.inputs() {
            if !model.inputs.iter().any(|i| i.name == declared.name) {
                return Err(InferError::Backend(format!(
                    "registered input '{}' not found in model",
                    declared.name
                )));
            }
        }
        for name in request.spec.outputs() {
            let output = model
                .outputs
                .iter()
                .find(|o| &o.name == name)
                .ok_or_else(|| {
                    InferError::Backend(format!("registered output '{name}' not found in model"))
                })?;
            bindings.push(MockBinding {
                name: output.name.clone(),
                is_input: false,
                dims: output.dims.clone(),
                data_type: output.data_type,
            });
        }

        lock(&self.stats).engines_built += 1;
        log::debug!(
            "mock engine with {} bindings, op {:?}, precision {}",
            bindings.len(),
            model.op,
            request.precision
        );

        Ok(Box::new(MockEngine {
            bindings,
            max_batch_size: model.max_batch_size.unwrap_or(request.max_batch_size),
            op: model.op,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct MockEngine {
    bindings: Vec<MockBinding>,
    max_batch_size: usize,
    op: MockOp,
    stats: Arc<Mutex<MockStats>>,
}

impl Engine for MockEngine {
    fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    fn binding_name(&self, index: usize) -> &str {
        &self.bindings[index].name
    }

    fn binding_is_input(&self, index: usize) -> bool {
        self.bindings[index].is_input
    }

    fn binding_dims(&self, index: usize) -> Vec<i64> {
        self.bindings[index].dims.clone()
    }

    fn binding_data_type(&self, index: usize) -> i32 {
        self.bindings[index].data_type
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn create_execution_context(&mut self) -> Result<Box<dyn ExecutionContext + '_>, InferError> {
        let mut stats = lock(&self.stats);
        stats.contexts_created += 1;
        stats.live_contexts += 1;
        drop(stats);
        Ok(Box::new(MockContext { engine: self }))
    }
}

struct MockContext<'a> {
    engine: &'a MockEngine,
}

impl Drop for MockContext<'_> {
    fn drop(&mut self) {
        lock(&self.engine.stats).live_contexts -= 1;
    }
}

impl ExecutionContext for MockContext<'_> {
    fn execute(
        &mut self,
        batch_size: usize,
        bindings: &mut [DeviceSlice<'_>],
    ) -> Result<(), InferError> {
        let engine = self.engine;
        if bindings.len() != engine.bindings.len() {
            return Err(InferError::Backend(format!(
                "expected {} bindings, got {}",
                engine.bindings.len(),
                bindings.len()
            )));
        }
        if batch_size == 0 || batch_size > engine.max_batch_size {
            return Err(InferError::Backend(format!(
                "batch {batch_size} outside 1..={}",
                engine.max_batch_size
            )));
        }

        {
            let mut stats = lock(&engine.stats);
            stats.executions += 1;
            stats.last_batch_size = Some(batch_size);
        }

        if engine.op == MockOp::Fail {
            return Err(InferError::Backend("mock execution failed".to_string()));
        }

        let Some(first) = engine.bindings.iter().position(|b| b.is_input) else {
            return Ok(());
        };
        let mut source = vec![0u8; bindings[first].len()];
        bindings[first].copy_to_host(&mut source)?;
        let in_row = source.len() / batch_size;

        for (binding, slice) in engine.bindings.iter().zip(bindings.iter_mut()) {
            if binding.is_input {
                continue;
            }
            let out_row = slice.len() / batch_size;
            let mut rows = vec![0u8; slice.len()];
            for (row, chunk) in rows.chunks_mut(out_row.max(1)).enumerate() {
                let src = &source[row * in_row..(row + 1) * in_row];
                for (dst, &byte) in chunk.iter_mut().zip(src.iter().cycle()) {
                    *dst = byte;
                }
            }
            slice.copy_from_host(&rows)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Device, InputLayout, ModelSpec, Precision};

    fn write_model(name: &str, json: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("pose_mock_unit_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, json).unwrap();
        path
    }

    fn request<'a>(spec: &'a ModelSpec, device: &'a Device) -> BuildRequest<'a> {
        BuildRequest {
            spec,
            layout: InputLayout::Nchw,
            max_batch_size: 2,
            precision: Precision::Fp32,
            device,
        }
    }

    #[test]
    fn test_binding_order_follows_model_inputs() {
        let path = write_model(
            "order.json",
            r#"{ "inputs": [{ "name": "b" }, { "name": "a" }],
                 "outputs": [{ "name": "y", "dims": [4] }, { "name": "z", "dims": [2] }] }"#,
        );
        let spec = ModelSpec::new(&path)
            .with_input("a", [1, 2, 2])
            .with_input("b", [3, 1, 1])
            .with_output("y");
        let backend = MockBackend::new();
        let engine = backend.build(&request(&spec, &Device::Cpu)).unwrap();

        assert_eq!(engine.binding_count(), 3);
        assert_eq!(engine.binding_name(0), "b");
        assert_eq!(engine.binding_dims(0), vec![3, 1, 1]);
        assert_eq!(engine.binding_name(1), "a");
        assert_eq!(engine.binding_name(2), "y");
        assert!(!engine.binding_is_input(2));
        assert_eq!(backend.stats().engines_built, 1);
    }

    #[test]
    fn test_input_dims_follow_requested_layout() {
        let path = write_model(
            "layout.json",
            r#"{ "inputs": [{ "name": "image" }], "outputs": [{ "name": "y", "dims": [4] }] }"#,
        );
        let spec = ModelSpec::new(&path).with_input("image", [3, 256, 192]).with_output("y");
        let request = request(&spec, &Device::Cpu);
        let engine = MockBackend::new().build(&request).unwrap();

        assert_eq!(request.layout, InputLayout::Nchw);
        assert_eq!(engine.binding_dims(0), vec![3, 256, 192]);
    }

    #[test]
    fn test_unregistered_model_input_fails() {
        let path = write_model(
            "extra_input.json",
            r#"{ "inputs": [{ "name": "a" }, { "name": "b" }],
                 "outputs": [{ "name": "y", "dims": [4] }] }"#,
        );
        let spec = ModelSpec::new(&path).with_input("a", [1, 1, 1]).with_output("y");
        let result = MockBackend::new().build(&request(&spec, &Device::Cpu));
        assert!(matches!(result, Err(InferError::Backend(_))));
    }

    #[test]
    fn test_missing_output_fails() {
        let path = write_model(
            "no_output.json",
            r#"{ "inputs": [{ "name": "a" }], "outputs": [{ "name": "y", "dims": [4] }] }"#,
        );
        let spec = ModelSpec::new(&path).with_input("a", [1, 1, 1]).with_output("q");
        let err = MockBackend::new()
            .build(&request(&spec, &Device::Cpu))
            .err()
            .unwrap();
        assert!(err.to_string().contains("'q'"));
    }

    #[test]
    fn test_context_counts() {
        let path = write_model(
            "ctx.json",
            r#"{ "inputs": [{ "name": "a" }], "outputs": [{ "name": "y", "dims": [4] }] }"#,
        );
        let spec = ModelSpec::new(&path).with_input("a", [1, 1, 1]).with_output("y");
        let backend = MockBackend::new();
        let mut engine = backend.build(&request(&spec, &Device::Cpu)).unwrap();

        let context = engine.create_execution_context().unwrap();
        assert_eq!(backend.stats().live_contexts, 1);
        drop(context);
        let stats = backend.stats();
        assert_eq!(stats.live_contexts, 0);
        assert_eq!(stats.contexts_created, 1);
    }
}
