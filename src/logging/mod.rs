//! Structured logging for milling runs.
//!
//! Warnings and errors must reach the operator console and the run log file
//! at the same time, so the subscriber stacks a human-readable console
//! layer with a daily-rolling JSON file layer.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub console_output: bool,
    pub log_directory: Option<PathBuf>,
    pub include_file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        Self {
            level: level.to_string(),
            ..Default::default()
        }
    }
}

/// Install the global subscriber. The returned guard must stay alive for
/// the duration of the run or buffered file output is lost.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={}",
            env!("CARGO_PKG_NAME").replace('-', "_"),
            config.level
        ))
    });

    let mut layers = Vec::new();
    let mut guard = None;

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_file_location);
        layers.push(console_layer.boxed());
    }

    if let Some(ref log_dir) = config.log_directory {
        let file_appender = tracing_appender::rolling::daily(log_dir, "cryomill.log");
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json();
        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .init();

    tracing::debug!(?config, "logging initialized");
    Ok(guard)
}
