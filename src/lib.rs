//! JavaScript plugin converter
//!
//! Recovers metadata and scraping patterns from JavaScript source plugins
//! without running them, and turns the result into a native content source.

pub mod core;
pub mod plugin;

// Re-export commonly used types
pub use crate::core::{Config, ConverterError};
pub use plugin::{AnalyzedPlugin, AnalyzerKind, ContentSource, PluginAnalyzer, PluginConverter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
