use log::{LevelFilter, Log};
use pose_base::logging::{
    init_file_logger, init_stdout_logger, parse_level, FileLogger, StdoutLogger,
};
use std::fs;

fn record_metadata(level: log::Level) -> log::Metadata<'static> {
    log::MetadataBuilder::new().level(level).target("test").build()
}

#[test]
fn test_stdout_logger_respects_max_level() {
    log::set_max_level(LevelFilter::Info);
    let logger = StdoutLogger;

    assert!(logger.enabled(&record_metadata(log::Level::Error)));
    assert!(logger.enabled(&record_metadata(log::Level::Info)));
    assert!(!logger.enabled(&record_metadata(log::Level::Trace)));

    let record = log::RecordBuilder::new()
        .level(log::Level::Info)
        .target("test")
        .file(Some("test.rs"))
        .line(Some(42))
        .args(format_args!("binding 0: name: image"))
        .build();
    logger.log(&record);
    logger.flush();
}

#[test]
fn test_file_logger_creates_directory() {
    let dir = std::env::temp_dir().join(format!("pose-log-test-{}-dir", std::process::id()));
    let _ = fs::remove_dir_all(&dir);

    let _logger = FileLogger::new(&dir).expect("Failed to create FileLogger");
    assert!(dir.is_dir());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_file_logger_writes_formatted_line() {
    let dir = std::env::temp_dir().join(format!("pose-log-test-{}-write", std::process::id()));
    let _ = fs::remove_dir_all(&dir);

    log::set_max_level(LevelFilter::Debug);
    let logger = FileLogger::new(&dir).expect("Failed to create FileLogger");
    let record = log::RecordBuilder::new()
        .level(log::Level::Error)
        .target("pose_runner::builder")
        .file(Some("builder.rs"))
        .line(Some(100))
        .args(format_args!("failed to create engine of data type: fp16"))
        .build();
    logger.log(&record);
    logger.flush();

    let entries: Vec<_> = fs::read_dir(&dir)
        .expect("Failed to read log directory")
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(entries.len(), 1);

    let content = fs::read_to_string(entries[0].path()).unwrap();
    assert!(content.contains("[ERROR]"));
    assert!(content.contains("thread:"));
    assert!(content.contains("pose_runner::builder"));
    assert!(content.contains("builder.rs:100"));
    assert!(content.contains("failed to create engine of data type: fp16"));
    assert!(content.ends_with('\n'));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_parse_level_names() {
    assert_eq!(parse_level("info"), Some(LevelFilter::Info));
    assert_eq!(parse_level("DEBUG"), Some(LevelFilter::Debug));
    assert_eq!(parse_level(""), None);
}

#[test]
fn test_init_stdout_logger_installs_global_logger() {
    init_stdout_logger();
    log::info!("global logger installed");
    assert!(log::max_level() >= LevelFilter::Error);
}

#[test]
fn test_init_file_logger_invalid_dir_returns_error() {
    assert!(init_file_logger("/proc/nonexistent/path").is_err());
}
