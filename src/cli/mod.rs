//! CLI-specific utilities for butterfly-cc
//!
//! Logging setup and report output, kept apart from the core library.

pub mod logging;
pub mod report;

pub use logging::{init_logging, LogFormat};
pub use report::{print_json, print_text, write_labels, Summary};
