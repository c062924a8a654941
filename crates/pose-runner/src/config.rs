//! Runner configuration, built in code or loaded from JSON.
//!
//! ```json
//! {
//!   "model": "models/openpose.onnx",
//!   "backend": "onnx",
//!   "device": { "kind": "cuda", "device_id": 0 },
//!   "inputs": [{ "name": "image", "shape": [3, 256, 192] }],
//!   "outputs": ["outputs/conf", "outputs/paf"],
//!   "max_batch_size": 4,
//!   "precision": "fp16"
//! }
//! ```

use crate::{Chw, Device, InferError, InputSpec, ModelSpec, Precision};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_backend() -> String {
    "onnx".to_string()
}

fn default_max_batch_size() -> usize {
    1
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    model: PathBuf,
    #[serde(default = "default_backend")]
    backend: String,
    #[serde(default)]
    device: Device,
    #[serde(default)]
    inputs: Vec<InputSpec>,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default = "default_max_batch_size")]
    max_batch_size: usize,
    #[serde(default)]
    precision: Precision,
}

impl RunnerConfig {
    pub fn new(model: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            backend: default_backend(),
            device: Device::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            max_batch_size: default_max_batch_size(),
            precision: Precision::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, InferError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file; a relative `model` path is resolved against the
    /// file's directory.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, InferError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            InferError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        let mut config = Self::from_json_str(&text)?;
        if config.model.is_relative() {
            if let Some(dir) = path.parent() {
                config.model = dir.join(&config.model);
            }
        }
        Ok(config)
    }

    /// Set the backend name, looked up in a [`BackendRegistry`](crate::BackendRegistry).
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Declare an input with its per-sample (channels, height, width) shape.
    pub fn with_input(mut self, name: impl Into<String>, shape: impl Into<Chw>) -> Self {
        self.inputs.push(InputSpec {
            name: name.into(),
            shape: shape.into(),
        });
        self
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    // Getters
    pub fn model(&self) -> &Path {
        &self.model
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn model_spec(&self) -> ModelSpec {
        let spec = self
            .inputs
            .iter()
            .fold(ModelSpec::new(&self.model), |spec, input| {
                spec.with_input(input.name.clone(), input.shape)
            });
        self.outputs
            .iter()
            .fold(spec, |spec, output| spec.with_output(output.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::new("model.onnx");
        assert_eq!(config.backend(), "onnx");
        assert_eq!(config.device(), &Device::Cpu);
        assert_eq!(config.max_batch_size(), 1);
        assert_eq!(config.precision(), Precision::Fp32);
    }

    #[test]
    fn test_builder_to_model_spec() {
        let spec = RunnerConfig::new("model.onnx")
            .with_input("image", [3, 256, 192])
            .with_output("outputs/conf")
            .with_output("outputs/paf")
            .model_spec();
        assert_eq!(spec.model_path(), Path::new("model.onnx"));
        assert_eq!(spec.inputs().len(), 1);
        assert_eq!(spec.outputs().len(), 2);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = RunnerConfig::from_json_str(
            r#"{
                "model": "models/openpose.onnx",
                "device": { "kind": "tensorrt", "device_id": 1 },
                "inputs": [{ "name": "image", "shape": [3, 368, 432] }],
                "outputs": ["outputs/conf", "outputs/paf"],
                "max_batch_size": 8,
                "precision": "fp16"
            }"#,
        )
        .unwrap();
        assert_eq!(config.backend(), "onnx");
        assert_eq!(config.device(), &Device::TensorRt { device_id: 1 });
        assert_eq!(config.max_batch_size(), 8);
        assert_eq!(config.precision(), Precision::Fp16);
        assert_eq!(
            config.model_spec().input("image").unwrap().shape,
            Chw::new(3, 368, 432)
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = RunnerConfig::from_json_str(r#"{ "model": "m", "batch": 4 }"#);
        assert!(matches!(result, Err(InferError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = RunnerConfig::from_json_file("/nonexistent/runner.json");
        assert!(matches!(result, Err(InferError::Config(_))));
    }
}
