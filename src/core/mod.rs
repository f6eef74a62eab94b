//! Ambient application layer
//!
//! - Configuration management and command-line arguments
//! - Structured logging system
//! - Error handling and type system

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CliArgs, Command, Config};
pub use error::{ConverterError, Result};
pub use logging::Logger;
