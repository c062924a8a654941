use crate::binding::{check_declared, resolve_bindings};
use crate::{
    Backend, BackendRegistry, BatchExecutor, Binding, BufferSet, DataType, DeviceAllocator,
    EngineBuilder, HostAllocator, InferError, ModelSpec, Precision, RunnerConfig,
};

/// Construct-once, invoke-many inference runner.
///
/// Owns the compiled engine and one device buffer per binding sized for the
/// maximum batch. `invoke` takes `&mut self`, so a runner serves one call at a
/// time; share it across threads behind a `Mutex` or give each worker its own.
pub struct Runner {
    executor: BatchExecutor,
    spec: ModelSpec,
    precision: Precision,
}

impl Runner {
    /// Build the engine, resolve its bindings and allocate buffers.
    ///
    /// Nothing is reachable unless every step succeeds; partially built state
    /// is dropped on the error path.
    pub fn new(
        config: &RunnerConfig,
        backend: &dyn Backend,
        allocator: &dyn DeviceAllocator,
    ) -> Result<Self, InferError> {
        let spec = config.model_spec();
        let engine = EngineBuilder::new(&spec)
            .with_max_batch_size(config.max_batch_size())
            .with_precision(config.precision())
            .with_device(config.device().clone())
            .build(backend)?;

        let bindings = resolve_bindings(engine.as_ref())?;
        check_declared(&bindings, &spec)?;

        let buffers = BufferSet::allocate(&bindings, config.max_batch_size(), allocator)?;

        Ok(Self {
            executor: BatchExecutor::new(engine, bindings, buffers)?,
            spec,
            precision: config.precision(),
        })
    }

    /// Build with the backend named in `config`, staging through host memory.
    pub fn from_config(
        config: &RunnerConfig,
        registry: &BackendRegistry,
    ) -> Result<Self, InferError> {
        let backend = registry.resolve(config.backend())?;
        Self::new(config, backend, &HostAllocator)
    }

    /// Like [`new`](Self::new) but logs and exits the process on failure.
    pub fn new_or_exit(
        config: &RunnerConfig,
        backend: &dyn Backend,
        allocator: &dyn DeviceAllocator,
    ) -> Self {
        match Self::new(config, backend, allocator) {
            Ok(runner) => runner,
            Err(err) => pose_base::log_fatal!("failed to create engine: {err}"),
        }
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn max_batch_size(&self) -> usize {
        self.executor.max_batch_size()
    }

    pub fn bindings(&self) -> &[Binding] {
        self.executor.bindings()
    }

    pub fn input_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.executor.input_bindings()
    }

    pub fn output_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.executor.output_bindings()
    }

    pub fn buffers(&self) -> &BufferSet {
        self.executor.buffers()
    }

    pub fn device_ptrs(&self) -> Vec<*const u8> {
        self.executor.buffers().device_ptrs()
    }

    /// Run one batch. `inputs` and `outputs` hold one host buffer per input
    /// and output binding, in binding order, each at least `batch_size` rows.
    pub fn invoke(
        &mut self,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
        batch_size: usize,
    ) -> Result<(), InferError> {
        self.executor.invoke(inputs, outputs, batch_size)
    }

    /// Run one batch over raw host pointers without length checks.
    ///
    /// # Safety
    /// Each pointer must address at least `batch_size * row_bytes` valid bytes
    /// for its binding (readable for inputs, writable for outputs) and output
    /// regions must not overlap each other or the inputs.
    pub unsafe fn invoke_raw(
        &mut self,
        inputs: &[*const u8],
        outputs: &[*mut u8],
        batch_size: usize,
    ) -> Result<(), InferError> {
        unsafe { self.executor.invoke_raw(inputs, outputs, batch_size) }
    }

    /// [`invoke`](Self::invoke) for engines whose bindings are all float32.
    pub fn invoke_f32(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        batch_size: usize,
    ) -> Result<(), InferError> {
        if let Some(binding) = self
            .bindings()
            .iter()
            .find(|b| b.data_type != DataType::Float32)
        {
            return Err(InferError::InvalidSpec(format!(
                "binding '{}' is {}, not float32",
                binding.name, binding.data_type
            )));
        }

        let inputs: Vec<&[u8]> = inputs.iter().map(|s| f32_bytes(s)).collect();
        let mut outputs: Vec<&mut [u8]> = outputs.iter_mut().map(|s| f32_bytes_mut(s)).collect();
        self.invoke(&inputs, &mut outputs, batch_size)
    }
}

fn f32_bytes(data: &[f32]) -> &[u8] {
    // u8 has no alignment requirement and f32 has no padding
    unsafe { std::slice::from_raw_parts(data.as_ptr().cast(), std::mem::size_of_val(data)) }
}

fn f32_bytes_mut(data: &mut [f32]) -> &mut [u8] {
    // every bit pattern is a valid f32
    unsafe { std::slice::from_raw_parts_mut(data.as_mut_ptr().cast(), std::mem::size_of_val(data)) }
}
