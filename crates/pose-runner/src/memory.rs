use crate::InferError;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Byte buffer owned by a compute device, addressable by a stable pointer.
pub trait DeviceMemory: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_ptr(&self) -> *const u8;

    fn as_mut_ptr(&mut self) -> *mut u8;

    /// Synchronous host -> device copy of `src` to `offset`.
    fn copy_from_host(&mut self, offset: usize, src: &[u8]) -> Result<(), InferError>;

    /// Synchronous device -> host copy of `dst.len()` bytes starting at `offset`.
    fn copy_to_host(&self, offset: usize, dst: &mut [u8]) -> Result<(), InferError>;

    /// Direct view of the bytes when the memory is host-addressable.
    fn host_bytes(&self) -> Option<&[u8]> {
        None
    }

    fn host_bytes_mut(&mut self) -> Option<&mut [u8]> {
        None
    }
}

/// Allocates [`DeviceMemory`] on one device.
pub trait DeviceAllocator {
    fn name(&self) -> &str;
    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceMemory>, InferError>;
}

fn check_range(offset: usize, count: usize, len: usize) -> Result<(), InferError> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(InferError::Device(format!(
            "copy of {count} bytes at offset {offset} exceeds buffer of {len} bytes"
        ))),
    }
}

const HOST_ALIGNMENT: usize = 64;

/// Zero-initialised, 64-byte aligned host memory.
pub struct HostMemory {
    ptr: NonNull<u8>,
    len: usize,
}

// the allocation is uniquely owned
unsafe impl Send for HostMemory {}

impl HostMemory {
    pub fn zeroed(len: usize) -> Result<Self, InferError> {
        if len == 0 {
            return Err(InferError::Device("zero-sized allocation".to_string()));
        }
        let layout = Layout::from_size_align(len, HOST_ALIGNMENT)
            .map_err(|e| InferError::Device(format!("invalid layout for {len} bytes: {e}")))?;
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| InferError::Device(format!("failed to allocate {len} bytes")))?;
        Ok(Self { ptr, len })
    }

    fn layout(&self) -> Layout {
        // validated in zeroed()
        unsafe { Layout::from_size_align_unchecked(self.len, HOST_ALIGNMENT) }
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout()) };
    }
}

impl DeviceMemory for HostMemory {
    fn len(&self) -> usize {
        self.len
    }

    fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn copy_from_host(&mut self, offset: usize, src: &[u8]) -> Result<(), InferError> {
        check_range(offset, src.len(), self.len)?;
        self.as_mut_slice()[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn copy_to_host(&self, offset: usize, dst: &mut [u8]) -> Result<(), InferError> {
        check_range(offset, dst.len(), self.len)?;
        dst.copy_from_slice(&self.as_slice()[offset..offset + dst.len()]);
        Ok(())
    }

    fn host_bytes(&self) -> Option<&[u8]> {
        Some(self.as_slice())
    }

    fn host_bytes_mut(&mut self) -> Option<&mut [u8]> {
        Some(self.as_mut_slice())
    }
}

/// Allocator for host-resident buffers. Backends that stage through host
/// memory (ONNX Runtime moves data to the GPU itself) use this.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostAllocator;

impl DeviceAllocator for HostAllocator {
    fn name(&self) -> &str {
        "host"
    }

    fn allocate(&self, len: usize) -> Result<Box<dyn DeviceMemory>, InferError> {
        Ok(Box::new(HostMemory::zeroed(len)?))
    }
}

/// The first `len` bytes of a device buffer, handed to an execution context.
pub struct DeviceSlice<'a> {
    memory: &'a mut dyn DeviceMemory,
    len: usize,
}

impl<'a> DeviceSlice<'a> {
    pub(crate) fn new(memory: &'a mut dyn DeviceMemory, len: usize) -> Result<Self, InferError> {
        check_range(0, len, memory.len())?;
        Ok(Self { memory, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.memory.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.memory.as_mut_ptr()
    }

    /// Copy exactly `len()` bytes in from the host.
    pub fn copy_from_host(&mut self, src: &[u8]) -> Result<(), InferError> {
        if src.len() != self.len {
            return Err(InferError::Device(format!(
                "slice copy-in of {} bytes into {} byte slice",
                src.len(),
                self.len
            )));
        }
        self.memory.copy_from_host(0, src)
    }

    /// Copy exactly `len()` bytes out to the host.
    pub fn copy_to_host(&self, dst: &mut [u8]) -> Result<(), InferError> {
        if dst.len() != self.len {
            return Err(InferError::Device(format!(
                "slice copy-out of {} byte slice into {} bytes",
                self.len,
                dst.len()
            )));
        }
        self.memory.copy_to_host(0, dst)
    }

    pub fn host_bytes(&self) -> Option<&[u8]> {
        let len = self.len;
        self.memory.host_bytes().map(|bytes| &bytes[..len])
    }

    pub fn host_bytes_mut(&mut self) -> Option<&mut [u8]> {
        let len = self.len;
        self.memory.host_bytes_mut().map(|bytes| &mut bytes[..len])
    }
}
