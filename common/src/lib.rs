//! Helpers shared by the USB host class driver crates.

mod logger;

pub use logger::{file_level, output_level, setup_logging};
