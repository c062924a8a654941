use log::{LevelFilter, Log, Metadata, Record};
use pose_runner::backends::MockBackend;
use pose_runner::{HostAllocator, Runner, RunnerConfig};
use std::sync::Mutex;

struct CaptureLogger {
    lines: Mutex<Vec<String>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
            lines.push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger {
    lines: Mutex::new(Vec::new()),
};

// the global logger can be set once per process, so this file holds one test
#[test]
fn test_binding_log_lines() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Info);

    let dir = std::env::temp_dir().join(format!("pose_binding_log_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let model = dir.join("pose.json");
    std::fs::write(
        &model,
        r#"{
            "inputs": [{ "name": "image" }],
            "outputs": [
                { "name": "outputs/conf", "dims": [19, 32, 24] },
                { "name": "outputs/paf", "dims": [38, 32, 24] }
            ]
        }"#,
    )
    .unwrap();

    let config = RunnerConfig::new(&model)
        .with_backend("mock")
        .with_input("image", [3, 256, 192])
        .with_output("outputs/conf")
        .with_output("outputs/paf")
        .with_max_batch_size(2);
    let _runner = Runner::new(&config, &MockBackend::new(), &HostAllocator).unwrap();

    let lines = LOGGER.lines.lock().unwrap();
    let bindings: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|l| l.starts_with("binding "))
        .collect();
    assert_eq!(
        bindings,
        vec![
            "binding 0: name: image input type float32 (3, 256, 192)",
            "binding 1: name: outputs/conf output type float32 (19, 32, 24)",
            "binding 2: name: outputs/paf output type float32 (38, 32, 24)",
        ]
    );
}
