//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the song service crates:
//! - Configuration loading and validation
//! - Logging and tracing setup

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, Environment};
pub use error::{Error, Result};
