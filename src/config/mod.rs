pub mod app_config;

pub use app_config::{AppConfig, ExecutionConfig, LogFormat, LoggingConfig, ServerConfig};
