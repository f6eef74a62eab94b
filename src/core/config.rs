//! Configuration management

use clap::{Parser, Subcommand};
use config::{
    builder::DefaultState, Config as RawConfig, ConfigBuilder, ConfigError as BuilderError,
    Environment, File,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::plugin::analyzer::AnalyzerKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid http configuration: {0}")]
    InvalidHttp(String),

    #[error("Invalid logging configuration: {0}")]
    InvalidLogging(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<BuilderError> for ConfigError {
    fn from(err: BuilderError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub analyzer: AnalyzerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with precedence: CLI args > Environment variables > Config file > Defaults
    pub fn load(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;

        if let Some(config_path) = &cli_args.config {
            if !config_path.exists() {
                return Err(ConfigError::FileNotFound(config_path.display().to_string()));
            }
            builder = builder.add_source(File::from(config_path.as_path()));
        }

        // Example: JSCONV__HTTP__TIMEOUT_SECS=10
        builder = builder.add_source(
            Environment::with_prefix("JSCONV")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(log_level) = &cli_args.log_level {
            builder = builder.set_override("logging.level", log_level.clone())?;
        }
        if let Some(strategy) = cli_args.strategy {
            builder = builder.set_override("analyzer.strategy", strategy.to_string())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let config: Config = Self::defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(RawConfig::builder()
            .set_default("http.timeout_secs", 30)?
            .set_default("http.connect_timeout_secs", 10)?
            .set_default("http.user_agent", concat!("jsconv/", env!("CARGO_PKG_VERSION")))?
            .set_default("http.accept_invalid_certs", false)?
            .set_default("analyzer.strategy", "auto")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "text")?
            .set_default("logging.output", "stderr")?)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "jsconv", version)]
#[command(about = "Analyze JavaScript source plugins and scrape with the recovered patterns", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Analysis strategy
    #[arg(short, long, value_enum, global = true)]
    pub strategy: Option<AnalyzerKind>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print what the analyzer recovered from a plugin
    Analyze {
        /// Plugin source file
        file: PathBuf,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List or search works through a converted plugin
    Search {
        file: PathBuf,

        /// Search text; omit to browse
        query: Option<String>,

        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// Fetch the details of one work
    Details { file: PathBuf, url: String },

    /// Fetch the chapter list of one work
    Chapters { file: PathBuf, url: String },

    /// Fetch the text of one chapter
    Content { file: PathBuf, url: String },
}

impl Command {
    pub fn file(&self) -> &Path {
        match self {
            Command::Analyze { file, .. }
            | Command::Search { file, .. }
            | Command::Details { file, .. }
            | Command::Chapters { file, .. }
            | Command::Content { file, .. } => file,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
}

impl HttpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidHttp("timeout_secs must be greater than 0".to_string()));
        }

        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidHttp(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidHttp("user_agent cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("jsconv/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzerConfig {
    pub strategy: AnalyzerKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "level must be one of: {:?}",
                valid_levels
            )));
        }

        let valid_formats = ["json", "text"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "format must be one of: {:?}",
                valid_formats
            )));
        }

        // stdout carries command output
        let valid_outputs = ["stderr", "file"];
        if !valid_outputs.contains(&self.output.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "output must be one of: {:?}",
                valid_outputs
            )));
        }

        if self.output == "file" && self.log_file.is_none() {
            return Err(ConfigError::InvalidLogging(
                "log_file must be specified when output is 'file'".to_string(),
            ));
        }

        Ok(())
    }
}
