use pose_base::log::info;
use pose_runner::{create_registry, HostAllocator, Runner, RunnerConfig};
use std::env;
use std::time::Instant;

const ITERATIONS: usize = 10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pose_base::init_stdout_logger();

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("POSE_RUNNER_CONFIG").ok())
        .unwrap_or_else(|| "runner.json".to_string());

    let config = RunnerConfig::from_json_file(&config_path)?;
    let registry = create_registry();
    let backend = registry.resolve(config.backend())?;
    let mut runner = Runner::new_or_exit(&config, backend, &HostAllocator);

    let max_batch_size = runner.max_batch_size();
    let inputs: Vec<Vec<u8>> = runner
        .input_bindings()
        .map(|b| vec![0u8; b.batch_bytes(max_batch_size)])
        .collect();
    let mut outputs: Vec<Vec<u8>> = runner
        .output_bindings()
        .map(|b| vec![0u8; b.batch_bytes(max_batch_size)])
        .collect();

    for batch_size in 1..=max_batch_size {
        let start = Instant::now();
        for _ in 0..ITERATIONS {
            let inputs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
            let mut outputs: Vec<&mut [u8]> = outputs.iter_mut().map(Vec::as_mut_slice).collect();
            runner.invoke(&inputs, &mut outputs, batch_size)?;
        }
        let per_call = start.elapsed().as_secs_f64() * 1000.0 / ITERATIONS as f64;
        info!(
            "batch {batch_size}: {per_call:.3}ms per call, {:.3}ms per sample",
            per_call / batch_size as f64
        );
    }

    Ok(())
}
