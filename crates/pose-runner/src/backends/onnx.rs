use crate::dtype::{CODE_FLOAT16, CODE_FLOAT32, CODE_INT8};
use crate::{
    Backend, BuildRequest, DataType, Device, DeviceSlice, Engine, ExecutionContext, InferError,
};
use ort::session::Session;
use ort::sys as ort_sys;
use ort::tensor::TensorElementType;
use ort::value::{DynValueTypeMarker, Value, ValueType};
use std::ptr::NonNull;

/// ONNX Runtime backend. The model's leading axis is the batch axis; inputs
/// must follow the requested layout with dims matching the registered shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnnxBackend;

struct OnnxBinding {
    name: String,
    is_input: bool,
    /// Batch axis excluded.
    dims: Vec<i64>,
    code: i32,
}

fn element_code(ty: TensorElementType) -> i32 {
    match ty {
        TensorElementType::Float32 => CODE_FLOAT32,
        TensorElementType::Float16 => CODE_FLOAT16,
        TensorElementType::Int8 => CODE_INT8,
        other => ort_sys::ONNXTensorElementDataType::from(other) as i32,
    }
}

fn element_type(data_type: DataType) -> TensorElementType {
    match data_type {
        DataType::Float32 => TensorElementType::Float32,
        DataType::Float16 => TensorElementType::Float16,
        DataType::Int8 => TensorElementType::Int8,
    }
}

fn tensor_info(
    name: &str,
    value_type: &ValueType,
) -> Result<(Vec<i64>, TensorElementType), InferError> {
    match value_type {
        ValueType::Tensor { ty, shape, .. } => Ok((shape.iter().copied().collect(), *ty)),
        other => Err(InferError::Backend(format!(
            "'{name}' is not a tensor: {other:?}"
        ))),
    }
}

impl OnnxBackend {
    fn session(request: &BuildRequest<'_>) -> Result<Session, InferError> {
        let builder = Session::builder()?;
        let precision = request.precision;

        let builder = match request.device {
            Device::Cpu => {
                if precision.is_reduced() {
                    return Err(InferError::Backend(format!(
                        "{precision} is not supported on the CPU execution provider"
                    )));
                }
                log::info!("onnx: using CPU execution provider");
                builder
            }
            #[cfg(feature = "cuda")]
            Device::Cuda { device_id } => {
                use ort::execution_providers::CUDAExecutionProvider;
                if precision.is_reduced() {
                    return Err(InferError::Backend(format!(
                        "{precision} requires the TensorRT execution provider"
                    )));
                }
                log::info!("onnx: using CUDA execution provider (device_id={device_id})");
                let ep = CUDAExecutionProvider::default().with_device_id(*device_id);
                builder.with_execution_providers([ep.build().error_on_failure()])?
            }
            #[cfg(not(feature = "cuda"))]
            Device::Cuda { .. } => {
                return Err(InferError::Backend(format!(
                    "{} requested but built without the cuda feature",
                    request.device
                )));
            }
            #[cfg(feature = "tensorrt")]
            Device::TensorRt { device_id } => {
                use crate::Precision;
                use ort::execution_providers::TensorRTExecutionProvider;
                let mut ep = TensorRTExecutionProvider::default().with_device_id(*device_id);
                ep = match precision {
                    Precision::Fp32 => ep,
                    Precision::Fp16 => ep.with_fp16(true),
                    Precision::Int8 => ep.with_fp16(true).with_int8(true),
                };
                log::info!(
                    "onnx: using TensorRT execution provider (device_id={device_id}, {precision})"
                );
                builder.with_execution_providers([ep.build().error_on_failure()])?
            }
            #[cfg(not(feature = "tensorrt"))]
            Device::TensorRt { .. } => {
                return Err(InferError::Backend(format!(
                    "{} requested but built without the tensorrt feature",
                    request.device
                )));
            }
        };

        let path = request.spec.model_path();
        builder
            .with_intra_threads(1)?
            .commit_from_file(path)
            .map_err(|e| InferError::Backend(format!("failed to load '{}': {e}", path.display())))
    }
}

impl Backend for OnnxBackend {
    fn name(&self) -> &str {
        "onnx"
    }

    fn build(&self, request: &BuildRequest<'_>) -> Result<Box<dyn Engine>, InferError> {
        let session = Self::session(request)?;
        let mut bindings = Vec::new();
        let mut max_batch_size = request.max_batch_size;

        for input in session.inputs() {
            let name = input.name();
            let declared = request.spec.input(name).ok_or_else(|| {
                InferError::Backend(format!("model input '{name}' was not registered"))
            })?;
            let (shape, ty) = tensor_info(name, input.dtype())?;
            let dims = request.layout.sample_dims(declared.shape);
            if shape.len() != dims.len() + 1 {
                return Err(InferError::Backend(format!(
                    "input '{name}' has rank {}, expected {:?}",
                    shape.len(),
                    request.layout
                )));
            }
            for (&model, &expected) in shape[1..].iter().zip(&dims) {
                if model > 0 && model != expected {
                    return Err(InferError::Backend(format!(
                        "input '{name}' has shape {shape:?}, registered {dims:?}"
                    )));
                }
            }
            if shape[0] > 0 {
                max_batch_size = max_batch_size.min(shape[0] as usize);
            }
            bindings.push(OnnxBinding {
                name: name.to_string(),
                is_input: true,
                dims,
                code: element_code(ty),
            });
        }

        for declared in request.spec.inputs() {
            if !bindings.iter().any(|b| b.name == declared.name) {
                return Err(InferError::Backend(format!(
                    "registered input '{}' not found in model",
                    declared.name
                )));
            }
        }

        for name in request.spec.outputs() {
            let output = session
                .outputs()
                .iter()
                .find(|o| o.name() == name.as_str())
                .ok_or_else(|| {
                    InferError::Backend(format!("registered output '{name}' not found in model"))
                })?;
            let (shape, ty) = tensor_info(name, output.dtype())?;
            let Some((&batch, dims)) = shape.split_first() else {
                return Err(InferError::Backend(format!("output '{name}' is a scalar")));
            };
            if batch > 0 {
                max_batch_size = max_batch_size.min(batch as usize);
            }
            bindings.push(OnnxBinding {
                name: name.clone(),
                is_input: false,
                dims: dims.to_vec(),
                code: element_code(ty),
            });
        }

        Ok(Box::new(OnnxEngine {
            session,
            bindings,
            max_batch_size,
        }))
    }
}

struct OnnxEngine {
    session: Session,
    bindings: Vec<OnnxBinding>,
    max_batch_size: usize,
}

impl Engine for OnnxEngine {
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
        self.bindings[index].code
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn create_execution_context(&mut self) -> Result<Box<dyn ExecutionContext + '_>, InferError> {
        Ok(Box::new(OnnxContext { engine: self }))
    }
}

struct OnnxContext<'a> {
    engine: &'a mut OnnxEngine,
}

impl ExecutionContext for OnnxContext<'_> {
    fn execute(
        &mut self,
        batch_size: usize,
        bindings: &mut [DeviceSlice<'_>],
    ) -> Result<(), InferError> {
        let engine = &mut *self.engine;
        if bindings.len() != engine.bindings.len() {
            return Err(InferError::Backend(format!(
                "expected {} bindings, got {}",
                engine.bindings.len(),
                bindings.len()
            )));
        }

        let mut io = engine.session.create_binding()?;
        let mut inputs = Vec::new();
        for (binding, slice) in engine.bindings.iter().zip(bindings.iter_mut()) {
            let data_type = DataType::from_code(binding.code).ok_or_else(|| {
                InferError::UnsupportedDataType {
                    binding: binding.name.clone(),
                    code: binding.code,
                }
            })?;
            if slice.host_bytes().is_none() {
                return Err(InferError::Device(format!(
                    "binding '{}' is not host-addressable; the onnx backend needs host buffers",
                    binding.name
                )));
            }
            let mut shape = Vec::with_capacity(binding.dims.len() + 1);
            shape.push(batch_size as i64);
            shape.extend_from_slice(&binding.dims);

            // the slice outlives the binding run below
            let tensor = unsafe {
                host_tensor(slice.as_mut_ptr(), slice.len(), &shape, element_type(data_type))?
            };
            if binding.is_input {
                io.bind_input(&binding.name, &tensor)?;
                inputs.push(tensor);
            } else {
                io.bind_output(&binding.name, tensor)?;
            }
        }

        engine.session.run_binding(&io)?;
        drop(inputs);
        Ok(())
    }
}

/// Wrap `bytes` of host memory at `ptr` as a tensor without copying.
///
/// # Safety
/// `ptr` must stay valid for `bytes` bytes for as long as the returned value
/// is bound and run.
unsafe fn host_tensor(
    ptr: *mut u8,
    bytes: usize,
    shape: &[i64],
    elem_type: TensorElementType,
) -> Result<Value<DynValueTypeMarker>, InferError> {
    let api = ort::api();

    let mut mem_info: *mut ort_sys::OrtMemoryInfo = std::ptr::null_mut();
    let status = unsafe {
        (api.CreateCpuMemoryInfo)(
            ort_sys::OrtAllocatorType::OrtArenaAllocator,
            ort_sys::OrtMemType::OrtMemTypeDefault,
            &mut mem_info,
        )
    };
    if !status.0.is_null() {
        unsafe { (api.ReleaseStatus)(status.0) };
        return Err(InferError::Backend("failed to create CPU memory info".to_string()));
    }

    let mut value: *mut ort_sys::OrtValue = std::ptr::null_mut();
    let status = unsafe {
        (api.CreateTensorWithDataAsOrtValue)(
            mem_info,
            ptr.cast(),
            bytes as _,
            shape.as_ptr(),
            shape.len() as _,
            elem_type.into(),
            &mut value,
        )
    };
    unsafe { (api.ReleaseMemoryInfo)(mem_info) };

    if !status.0.is_null() {
        unsafe { (api.ReleaseStatus)(status.0) };
        return Err(InferError::Backend(format!(
            "failed to create tensor of shape {shape:?}"
        )));
    }

    let value = NonNull::new(value)
        .ok_or_else(|| InferError::Backend("tensor creation returned null".to_string()))?;
    Ok(unsafe { Value::<DynValueTypeMarker>::from_ptr(value, None) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_codes() {
        assert_eq!(element_code(TensorElementType::Float32), CODE_FLOAT32);
        assert_eq!(element_code(TensorElementType::Float16), CODE_FLOAT16);
        assert_eq!(element_code(TensorElementType::Int8), CODE_INT8);
        assert_eq!(DataType::from_code(element_code(TensorElementType::Int64)), None);
    }
}
