use crate::InferError;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Per-sample input shape in channel-height-width order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[usize; 3]")]
pub struct Chw {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Chw {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    pub fn volume(&self) -> usize {
        self.channels * self.height * self.width
    }
}

impl From<[usize; 3]> for Chw {
    fn from(dims: [usize; 3]) -> Self {
        Chw::new(dims[0], dims[1], dims[2])
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub shape: Chw,
}

/// A model artifact plus the input/output contract it is compiled against.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    model_path: PathBuf,
    inputs: Vec<InputSpec>,
    outputs: Vec<String>,
}

impl ModelSpec {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

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

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|input| input.name == name)
    }

    pub fn validate(&self) -> Result<(), InferError> {
        if self.inputs.is_empty() {
            return Err(InferError::InvalidSpec("no inputs declared".to_string()));
        }
        if self.outputs.is_empty() {
            return Err(InferError::InvalidSpec("no outputs declared".to_string()));
        }

        let mut seen = HashSet::new();
        let names = self
            .inputs
            .iter()
            .map(|input| input.name.as_str())
            .chain(self.outputs.iter().map(String::as_str));
        for name in names {
            if name.is_empty() {
                return Err(InferError::InvalidSpec("empty tensor name".to_string()));
            }
            if !seen.insert(name) {
                return Err(InferError::InvalidSpec(format!(
                    "tensor name '{name}' declared twice"
                )));
            }
        }

        for input in &self.inputs {
            if input.shape.dims().contains(&0) {
                return Err(InferError::InvalidSpec(format!(
                    "input '{}' has a zero dimension in {:?}",
                    input.name,
                    input.shape.dims()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose_spec() -> ModelSpec {
        ModelSpec::new("model.onnx")
            .with_input("image", [3, 256, 192])
            .with_output("outputs/conf")
            .with_output("outputs/paf")
    }

    #[test]
    fn test_valid_spec() {
        let spec = pose_spec();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.input("image").unwrap().shape, Chw::new(3, 256, 192));
        assert_eq!(spec.inputs()[0].shape.volume(), 3 * 256 * 192);
        assert_eq!(spec.outputs(), &["outputs/conf", "outputs/paf"]);
    }

    #[test]
    fn test_missing_inputs_or_outputs() {
        let no_outputs = ModelSpec::new("m").with_input("image", [3, 4, 4]);
        assert!(matches!(no_outputs.validate(), Err(InferError::InvalidSpec(_))));
        let no_inputs = ModelSpec::new("m").with_output("out");
        assert!(matches!(no_inputs.validate(), Err(InferError::InvalidSpec(_))));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let spec = ModelSpec::new("m").with_input("x", [1, 1, 1]).with_output("x");
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let spec = ModelSpec::new("m").with_input("x", [3, 0, 4]).with_output("y");
        assert!(matches!(spec.validate(), Err(InferError::InvalidSpec(_))));
    }

    #[test]
    fn test_chw_deserializes_from_array() {
        let input: InputSpec =
            serde_json::from_str(r#"{ "name": "image", "shape": [3, 368, 432] }"#).unwrap();
        assert_eq!(input.shape, Chw::new(3, 368, 432));
    }
}
