//! Utility modules for tracepack

pub mod logging;

pub use logging::{config_from_env, init_logging, LoggingConfig};
