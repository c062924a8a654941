use crate::{
    Backend, Device, HostAllocator, InferError, ModelSpec, Precision, Runner, RunnerConfig,
};
use std::path::Path;

pub const POSE_INPUT_NAME: &str = "image";
pub const POSE_CONF_OUTPUT: &str = "outputs/conf";
pub const POSE_PAF_OUTPUT: &str = "outputs/paf";
pub const POSE_OUTPUT_NAMES: [&str; 2] = [POSE_CONF_OUTPUT, POSE_PAF_OUTPUT];

/// Batched pose-detection network: one `image` input, confidence and part
/// affinity field outputs.
pub trait PoseDetectionRunner {
    /// `inputs` holds the image batch, `outputs` the conf and paf batches, in
    /// engine binding order.
    fn run(
        &mut self,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
        batch_size: usize,
    ) -> Result<(), InferError>;

    fn max_batch_size(&self) -> usize;
}

impl PoseDetectionRunner for Runner {
    fn run(
        &mut self,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
        batch_size: usize,
    ) -> Result<(), InferError> {
        self.invoke(inputs, outputs, batch_size)
    }

    fn max_batch_size(&self) -> usize {
        Runner::max_batch_size(self)
    }
}

/// The pose network contract: `image` shaped (3, H, W), outputs conf and paf.
pub fn pose_model_spec(
    model_path: impl AsRef<Path>,
    input_height: usize,
    input_width: usize,
) -> ModelSpec {
    POSE_OUTPUT_NAMES.iter().fold(
        ModelSpec::new(model_path.as_ref())
            .with_input(POSE_INPUT_NAME, [3, input_height, input_width]),
        |spec, &name| spec.with_output(name),
    )
}

pub fn pose_runner_config(
    model_path: impl AsRef<Path>,
    input_height: usize,
    input_width: usize,
    max_batch_size: usize,
    use_f16: bool,
) -> RunnerConfig {
    POSE_OUTPUT_NAMES.iter().fold(
        RunnerConfig::new(model_path.as_ref())
            .with_input(POSE_INPUT_NAME, [3, input_height, input_width])
            .with_max_batch_size(max_batch_size)
            .with_precision(Precision::from_f16_flag(use_f16)),
        |config, &name| config.with_output(name),
    )
}

pub fn create_pose_detection_runner(
    backend: &dyn Backend,
    device: Device,
    model_path: impl AsRef<Path>,
    input_height: usize,
    input_width: usize,
    max_batch_size: usize,
    use_f16: bool,
) -> Result<Box<dyn PoseDetectionRunner>, InferError> {
    let config = pose_runner_config(model_path, input_height, input_width, max_batch_size, use_f16)
        .with_backend(backend.name())
        .with_device(device);
    let runner = Runner::new(&config, backend, &HostAllocator)?;
    Ok(Box::new(runner))
}
