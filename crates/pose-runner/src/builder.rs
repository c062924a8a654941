use crate::{Backend, BuildRequest, Device, Engine, InferError, InputLayout, ModelSpec, Precision};

/// Drives a [`Backend`] to compile a [`ModelSpec`] into an [`Engine`].
pub struct EngineBuilder<'a> {
    spec: &'a ModelSpec,
    max_batch_size: usize,
    precision: Precision,
    device: Device,
}

impl<'a> EngineBuilder<'a> {
    pub fn new(spec: &'a ModelSpec) -> Self {
        Self {
            spec,
            max_batch_size: 1,
            precision: Precision::Fp32,
            device: Device::Cpu,
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn build(&self, backend: &dyn Backend) -> Result<Box<dyn Engine>, InferError> {
        let _scope = pose_base::TraceScope::new("create_engine");

        self.spec.validate()?;
        if self.max_batch_size == 0 {
            return Err(InferError::InvalidSpec(
                "max batch size must be at least 1".to_string(),
            ));
        }

        for input in self.spec.inputs() {
            log::debug!(
                "register input {} as NCHW (N, {}, {}, {})",
                input.name,
                input.shape.channels,
                input.shape.height,
                input.shape.width
            );
        }
        for output in self.spec.outputs() {
            log::debug!("register output {output}");
        }

        let request = BuildRequest {
            spec: self.spec,
            layout: InputLayout::Nchw,
            max_batch_size: self.max_batch_size,
            precision: self.precision,
            device: &self.device,
        };

        log::info!(
            "building {} engine for {} on {} (max batch {}, {})",
            backend.name(),
            self.spec.model_path().display(),
            self.device,
            self.max_batch_size,
            self.precision
        );

        let engine = backend.build(&request).map_err(|err| {
            log::error!("failed to create engine of data type: {}", self.precision);
            match err {
                InferError::EngineBuild { .. } => err,
                other => InferError::EngineBuild {
                    precision: self.precision,
                    reason: other.to_string(),
                },
            }
        })?;

        if engine.max_batch_size() < self.max_batch_size {
            log::error!("failed to create engine of data type: {}", self.precision);
            return Err(InferError::EngineBuild {
                precision: self.precision,
                reason: format!(
                    "engine supports batches up to {}, requested {}",
                    engine.max_batch_size(),
                    self.max_batch_size
                ),
            });
        }

        Ok(engine)
    }
}
