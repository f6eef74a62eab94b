//! Structured logging system
//!
//! Logs go to stderr or to a file so that stdout stays free for command
//! output. Both JSON and text formats are supported.

use crate::core::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logger instance that manages the logging system
pub struct Logger {
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Initialize the global tracing subscriber from configuration.
    ///
    /// `RUST_LOG`, when set, takes precedence over the configured level.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let level = parse_log_level(&config.level)?;

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

        let (writer, guard) = match config.output.as_str() {
            "stderr" => tracing_appender::non_blocking(std::io::stderr()),
            "file" => {
                let log_file = config
                    .log_file
                    .as_ref()
                    .context("log_file must be specified when output is 'file'")?;

                let directory = match log_file.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => std::path::PathBuf::from("."),
                };
                std::fs::create_dir_all(&directory).context("Failed to create log directory")?;

                let filename = log_file
                    .file_name()
                    .context("Log file must have a filename")?;

                tracing_appender::non_blocking(tracing_appender::rolling::never(directory, filename))
            }
            _ => {
                anyhow::bail!("Invalid output configuration: {}", config.output);
            }
        };

        let fmt_layer = match config.format.as_str() {
            "json" => fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(true)
                .with_target(true)
                .boxed(),
            "text" => fmt::layer()
                .with_writer(writer)
                .with_ansi(config.output == "stderr")
                .with_target(true)
                .boxed(),
            _ => {
                anyhow::bail!("Invalid format configuration: {}", config.format);
            }
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .context("Failed to initialize tracing subscriber")?;

        tracing::debug!(
            level = %config.level,
            format = %config.format,
            output = %config.output,
            "Logging system initialized"
        );

        Ok(Logger {
            _guard: Some(guard),
        })
    }
}

/// Parse log level string to tracing Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {}", level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("debug"), Ok(Level::DEBUG)));
        assert!(matches!(parse_log_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("error"), Ok(Level::ERROR)));
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_rejects_unknown_output() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "text".to_string(),
            output: "syslog".to_string(),
            log_file: None,
        };
        assert!(Logger::init(&config).is_err());
    }

    #[test]
    fn test_file_output_requires_path() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "json".to_string(),
            output: "file".to_string(),
            log_file: None,
        };
        assert!(Logger::init(&config).is_err());
    }
}
