use crate::{Binding, BufferSet, Direction, Engine, InferError};
use pose_base::TraceScope;

/// Runs copy-in / execute / copy-out cycles over an engine and its buffers.
pub struct BatchExecutor {
    engine: Box<dyn Engine>,
    bindings: Vec<Binding>,
    buffers: BufferSet,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

impl BatchExecutor {
    /// `bindings` must be the engine's resolved bindings in index order, and
    /// `buffers` must hold one buffer per binding sized to its row.
    pub fn new(
        engine: Box<dyn Engine>,
        bindings: Vec<Binding>,
        buffers: BufferSet,
    ) -> Result<Self, InferError> {
        if bindings.len() != engine.binding_count() || buffers.len() != bindings.len() {
            return Err(InferError::InvalidSpec(format!(
                "engine has {} bindings, given {} bindings and {} buffers",
                engine.binding_count(),
                bindings.len(),
                buffers.len()
            )));
        }
        for (position, binding) in bindings.iter().enumerate() {
            let row_bytes = buffers.get(position).map(|b| b.row_bytes());
            if binding.index != position || row_bytes != Some(binding.row_bytes()) {
                return Err(InferError::InvalidSpec(format!(
                    "binding '{}' at position {position} does not match its buffer",
                    binding.name
                )));
            }
        }

        let inputs = bindings
            .iter()
            .filter(|b| b.is_input())
            .map(|b| b.index)
            .collect();
        let outputs = bindings
            .iter()
            .filter(|b| !b.is_input())
            .map(|b| b.index)
            .collect();
        Ok(Self {
            engine,
            bindings,
            buffers,
            inputs,
            outputs,
        })
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn buffers(&self) -> &BufferSet {
        &self.buffers
    }

    pub fn max_batch_size(&self) -> usize {
        self.buffers.max_batch_size()
    }

    pub fn input_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.inputs.iter().map(|&i| &self.bindings[i])
    }

    pub fn output_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.outputs.iter().map(|&i| &self.bindings[i])
    }

    /// Batch size and buffer counts; host lengths are checked separately.
    fn check_call(
        &self,
        inputs: usize,
        outputs: usize,
        batch_size: usize,
    ) -> Result<(), InferError> {
        if batch_size == 0 || batch_size > self.max_batch_size() {
            return Err(InferError::InvalidBatch {
                batch_size,
                max_batch_size: self.max_batch_size(),
            });
        }
        if inputs != self.inputs.len() {
            return Err(InferError::BindingMismatch {
                direction: Direction::Input,
                expected: self.inputs.len(),
                got: inputs,
            });
        }
        if outputs != self.outputs.len() {
            return Err(InferError::BindingMismatch {
                direction: Direction::Output,
                expected: self.outputs.len(),
                got: outputs,
            });
        }
        Ok(())
    }

    fn check_host_len(binding: &Binding, batch_size: usize, have: usize) -> Result<(), InferError> {
        let need = binding.batch_bytes(batch_size);
        if have < need {
            return Err(InferError::BufferTooSmall {
                binding: binding.name.clone(),
                need,
                have,
            });
        }
        Ok(())
    }

    /// Host buffers are in binding order, one per input and one per output
    /// binding, each holding at least `batch_size` rows.
    pub fn invoke(
        &mut self,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
        batch_size: usize,
    ) -> Result<(), InferError> {
        self.check_call(inputs.len(), outputs.len(), batch_size)?;
        for (&index, host) in self.inputs.iter().zip(inputs) {
            Self::check_host_len(&self.bindings[index], batch_size, host.len())?;
        }
        for (&index, host) in self.outputs.iter().zip(outputs.iter()) {
            Self::check_host_len(&self.bindings[index], batch_size, host.len())?;
        }

        self.copy_in(inputs, batch_size)?;
        self.execute(batch_size)?;
        self.copy_out(outputs, batch_size)
    }

    /// Pointer variant of [`invoke`](Self::invoke).
    ///
    /// # Safety
    /// Every input pointer must be valid for reads, and every output pointer
    /// for writes, of `batch_size * row_bytes` bytes of its binding. Output
    /// regions must not overlap each other or any input region.
    pub unsafe fn invoke_raw(
        &mut self,
        inputs: &[*const u8],
        outputs: &[*mut u8],
        batch_size: usize,
    ) -> Result<(), InferError> {
        self.check_call(inputs.len(), outputs.len(), batch_size)?;
        if inputs.iter().any(|p| p.is_null()) || outputs.iter().any(|p| p.is_null()) {
            return Err(InferError::Device("null host pointer".to_string()));
        }

        let host_inputs: Vec<&[u8]> = self
            .inputs
            .iter()
            .zip(inputs)
            .map(|(&index, &ptr)| {
                let len = self.bindings[index].batch_bytes(batch_size);
                unsafe { std::slice::from_raw_parts(ptr, len) }
            })
            .collect();
        let mut host_outputs: Vec<&mut [u8]> = self
            .outputs
            .iter()
            .zip(outputs)
            .map(|(&index, &ptr)| {
                let len = self.bindings[index].batch_bytes(batch_size);
                unsafe { std::slice::from_raw_parts_mut(ptr, len) }
            })
            .collect();

        self.invoke(&host_inputs, &mut host_outputs, batch_size)
    }

    fn copy_in(&mut self, inputs: &[&[u8]], batch_size: usize) -> Result<(), InferError> {
        let _scope = TraceScope::new("copy input from host");
        for (&index, host) in self.inputs.iter().zip(inputs) {
            self.buffers.get_mut(index)?.upload(batch_size, host)?;
        }
        Ok(())
    }

    fn execute(&mut self, batch_size: usize) -> Result<(), InferError> {
        let _scope = TraceScope::new("context->execute");
        let mut slices = self.buffers.slices(batch_size)?;
        // dropped before returning, on success or error
        let mut context = self.engine.create_execution_context()?;
        context.execute(batch_size, &mut slices)
    }

    fn copy_out(&mut self, outputs: &mut [&mut [u8]], batch_size: usize) -> Result<(), InferError> {
        let _scope = TraceScope::new("copy output to host");
        for (&index, host) in self.outputs.iter().zip(outputs.iter_mut()) {
            self.buffers.get_mut(index)?.download(batch_size, host)?;
        }
        Ok(())
    }
}
