pub mod backend;
pub mod backendregistry;
pub mod backends;
pub mod binding;
pub mod buffer;
pub mod builder;
pub mod config;
pub mod device;
pub mod dtype;
pub mod error;
pub mod executor;
pub mod memory;
pub mod modelspec;
pub mod pose;
pub mod precision;
pub mod runner;

pub use backend::{Backend, BuildRequest, Engine, ExecutionContext, InputLayout};
pub use backendregistry::{create_registry, BackendRegistry};
pub use binding::{check_declared, format_dims, resolve_bindings, Binding, Direction};
pub use buffer::{BufferSet, DeviceBuffer};
pub use builder::EngineBuilder;
pub use config::RunnerConfig;
pub use device::Device;
pub use dtype::DataType;
pub use error::InferError;
pub use executor::BatchExecutor;
pub use memory::{DeviceAllocator, DeviceMemory, DeviceSlice, HostAllocator, HostMemory};
pub use modelspec::{Chw, InputSpec, ModelSpec};
pub use pose::{
    create_pose_detection_runner, pose_model_spec, pose_runner_config, PoseDetectionRunner,
    POSE_INPUT_NAME, POSE_OUTPUT_NAMES,
};
pub use precision::Precision;
pub use runner::Runner;
