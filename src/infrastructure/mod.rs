//! Infrastructure layer - process-level plumbing

pub mod logging;
