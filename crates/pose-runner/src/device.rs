use serde::Deserialize;
use std::fmt;

/// Where the backend runs the compiled engine.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda {
        #[serde(default)]
        device_id: i32,
    },
    #[serde(alias = "trt")]
    TensorRt {
        #[serde(default)]
        device_id: i32,
    },
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "CPU"),
            Device::Cuda { device_id } => write!(f, "CUDA(device_id={device_id})"),
            Device::TensorRt { device_id } => write!(f, "TensorRT(device_id={device_id})"),
        }
    }
}
