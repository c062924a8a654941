#![cfg(feature = "onnx")]

use pose_runner::backends::OnnxBackend;
use pose_runner::{
    create_registry, Backend, Device, HostAllocator, InferError, Runner, RunnerConfig,
};

#[test]
fn test_onnx_backend_name() {
    assert_eq!(OnnxBackend.name(), "onnx");
}

#[test]
fn test_create_registry_includes_onnx() {
    let registry = create_registry();
    assert!(registry.list().contains(&"onnx"));
    assert!(registry.get("onnx").is_some());
}

#[test]
fn test_missing_model_fails_build() {
    let config = RunnerConfig::new("/nonexistent/pose.onnx")
        .with_input("image", [3, 256, 192])
        .with_output("outputs/conf");
    let result = Runner::new(&config, &OnnxBackend, &HostAllocator);
    assert!(matches!(result, Err(InferError::EngineBuild { .. })));
}

#[test]
#[cfg(not(feature = "tensorrt"))]
fn test_tensorrt_device_needs_feature() {
    let config = RunnerConfig::new("/nonexistent/pose.onnx")
        .with_device(Device::TensorRt { device_id: 0 })
        .with_input("image", [3, 256, 192])
        .with_output("outputs/conf");
    let err = Runner::new(&config, &OnnxBackend, &HostAllocator).err().unwrap();
    assert!(err.to_string().contains("tensorrt"));
}
