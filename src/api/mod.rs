//! API layer - the axum host adapter

pub mod host;

pub use host::{AxumHost, ErrorHandler};
