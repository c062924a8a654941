pub mod logging;
pub mod trace;

pub use logging::{init_file_logger, init_stdout_logger, level_from_env, FileLogger, StdoutLogger};
pub use trace::TraceScope;

// Re-export log crate so downstream crates can use pose_base::log::*
pub use log;
