use crate::{Backend, InferError};
use std::collections::HashMap;

/// Backends addressable by the name a [`RunnerConfig`](crate::RunnerConfig) carries.
pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a backend, replacing any previous one with the same name.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        let name = backend.name().to_string();
        if self.backends.insert(name.clone(), backend).is_some() {
            log::warn!("backend '{name}' registered twice, keeping the latest");
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Backend> {
        self.backends.get(name).map(|b| &**b as &dyn Backend)
    }

    pub fn resolve(&self, name: &str) -> Result<&dyn Backend, InferError> {
        self.get(name)
            .ok_or_else(|| InferError::UnknownBackend(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with every backend compiled into this build.
pub fn create_registry() -> BackendRegistry {
    #[allow(unused_mut)]
    let mut registry = BackendRegistry::new();

    #[cfg(feature = "onnx")]
    registry.register(Box::new(crate::backends::OnnxBackend));

    #[cfg(any(test, feature = "mock"))]
    registry.register(Box::new(crate::backends::MockBackend::new()));

    registry
}
