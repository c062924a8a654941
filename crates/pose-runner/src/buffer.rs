use crate::{Binding, DeviceAllocator, DeviceMemory, DeviceSlice, InferError};

/// Device memory for one binding, shaped `[max_batch_size, row_bytes]`.
pub struct DeviceBuffer {
    memory: Box<dyn DeviceMemory>,
    rows: usize,
    row_bytes: usize,
}

impl DeviceBuffer {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn len(&self) -> usize {
        self.rows * self.row_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.memory.as_ptr()
    }

    fn check_rows(&self, batch_size: usize) -> Result<(), InferError> {
        if batch_size == 0 || batch_size > self.rows {
            return Err(InferError::InvalidBatch {
                batch_size,
                max_batch_size: self.rows,
            });
        }
        Ok(())
    }

    /// First `batch_size` rows.
    pub fn slice(&mut self, batch_size: usize) -> Result<DeviceSlice<'_>, InferError> {
        self.check_rows(batch_size)?;
        DeviceSlice::new(self.memory.as_mut(), batch_size * self.row_bytes)
    }

    /// Copy `batch_size` rows from the host into the first rows.
    pub fn upload(&mut self, batch_size: usize, src: &[u8]) -> Result<(), InferError> {
        self.check_rows(batch_size)?;
        let need = batch_size * self.row_bytes;
        let src = src.get(..need).ok_or_else(|| host_too_small(need, src.len()))?;
        self.memory.copy_from_host(0, src)
    }

    /// Copy the first `batch_size` rows out to the host.
    pub fn download(&self, batch_size: usize, dst: &mut [u8]) -> Result<(), InferError> {
        self.check_rows(batch_size)?;
        let need = batch_size * self.row_bytes;
        let have = dst.len();
        let dst = dst.get_mut(..need).ok_or_else(|| host_too_small(need, have))?;
        self.memory.copy_to_host(0, dst)
    }
}

fn host_too_small(need: usize, have: usize) -> InferError {
    InferError::Device(format!("host region of {have} bytes, need {need}"))
}

/// One [`DeviceBuffer`] per binding, allocated once for the maximum batch.
pub struct BufferSet {
    buffers: Vec<DeviceBuffer>,
    max_batch_size: usize,
}

impl BufferSet {
    pub fn allocate(
        bindings: &[Binding],
        max_batch_size: usize,
        allocator: &dyn DeviceAllocator,
    ) -> Result<Self, InferError> {
        let _scope = pose_base::TraceScope::new("create_buffers");
        if max_batch_size == 0 {
            return Err(InferError::InvalidBatch {
                batch_size: 0,
                max_batch_size,
            });
        }

        let mut buffers = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let row_bytes = binding.row_bytes();
            let len = row_bytes.checked_mul(max_batch_size).ok_or_else(|| {
                InferError::Device(format!("buffer for '{}' overflows usize", binding.name))
            })?;
            let memory = allocator.allocate(len)?;
            log::debug!(
                "allocated {len} bytes on {} for binding {} ({})",
                allocator.name(),
                binding.index,
                binding.name
            );
            buffers.push(DeviceBuffer {
                memory,
                rows: max_batch_size,
                row_bytes,
            });
        }

        Ok(Self {
            buffers,
            max_batch_size,
        })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn get(&self, index: usize) -> Option<&DeviceBuffer> {
        self.buffers.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Result<&mut DeviceBuffer, InferError> {
        let count = self.buffers.len();
        self.buffers
            .get_mut(index)
            .ok_or(InferError::InvalidBindingIndex { index, count })
    }

    /// View of the first `batch_size` rows of buffer `index`.
    pub fn slice(
        &mut self,
        index: usize,
        batch_size: usize,
    ) -> Result<DeviceSlice<'_>, InferError> {
        self.get_mut(index)?.slice(batch_size)
    }

    /// Views of every buffer, in binding order.
    pub fn slices(&mut self, batch_size: usize) -> Result<Vec<DeviceSlice<'_>>, InferError> {
        self.buffers
            .iter_mut()
            .map(|buffer| buffer.slice(batch_size))
            .collect()
    }

    /// Base pointers of every buffer; stable for the set's lifetime.
    pub fn device_ptrs(&self) -> Vec<*const u8> {
        self.buffers.iter().map(DeviceBuffer::as_ptr).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataType, Direction, HostAllocator};

    fn bindings() -> Vec<Binding> {
        vec![
            Binding {
                index: 0,
                name: "image".to_string(),
                direction: Direction::Input,
                dims: vec![3, 4, 2],
                data_type: DataType::Float32,
            },
            Binding {
                index: 1,
                name: "mask".to_string(),
                direction: Direction::Output,
                dims: vec![5],
                data_type: DataType::Int8,
            },
        ]
    }

    #[test]
    fn test_allocates_for_max_batch() {
        let set = BufferSet::allocate(&bindings(), 4, &HostAllocator).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).unwrap().len(), 4 * 24 * 4);
        assert_eq!(set.get(1).unwrap().len(), 4 * 5);
        assert_eq!(set.get(1).unwrap().row_bytes(), 5);
    }

    #[test]
    fn test_slice_bounds() {
        let mut set = BufferSet::allocate(&bindings(), 4, &HostAllocator).unwrap();
        assert_eq!(set.slice(0, 1).unwrap().len(), 96);
        assert_eq!(set.slice(0, 4).unwrap().len(), 384);
        assert!(matches!(
            set.slice(0, 5),
            Err(InferError::InvalidBatch { batch_size: 5, max_batch_size: 4 })
        ));
        assert!(matches!(set.slice(0, 0), Err(InferError::InvalidBatch { .. })));
        assert!(matches!(
            set.slice(2, 1),
            Err(InferError::InvalidBindingIndex { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_upload_touches_only_prefix_rows() {
        let mut set = BufferSet::allocate(&bindings(), 3, &HostAllocator).unwrap();
        let buffer = set.get_mut(1).unwrap();
        buffer.upload(3, &[7u8; 15]).unwrap();
        buffer.upload(1, &[1u8; 5]).unwrap();

        let mut all = [0u8; 15];
        buffer.download(3, &mut all).unwrap();
        assert_eq!(&all[..5], &[1; 5]);
        assert_eq!(&all[5..], &[7; 10]);
    }

    #[test]
    fn test_zero_max_batch_rejected() {
        assert!(BufferSet::allocate(&bindings(), 0, &HostAllocator).is_err());
    }
}
