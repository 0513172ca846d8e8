//! Core library modules for butterfly-cc
//!
//! Error handling and run configuration shared by every other module.

pub mod config;
pub mod error;

pub use config::{CcConfig, SamplingParams, Strategy};
pub use error::{Error, Result};
