use serde::{Deserialize, Serialize};
use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    pub include_file_location: bool,
    pub include_thread_names: bool,
    pub include_span_events: bool,
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            output: LogOutput::Stdout,
            include_file_location: true,
            include_thread_names: false,
            include_span_events: false,
            filter: None,
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-line
    Pretty,
    /// Single line
    Compact,
    /// One JSON object per event
    Json,
}

/// Log destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
}

/// Install the global tracing subscriber.
///
/// Returns an error if a subscriber is already installed, so hosts and tests
/// may call it more than once and ignore the result.
pub fn setup_logging(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = if let Some(filter) = &config.filter {
        EnvFilter::try_new(filter)?
    } else {
        EnvFilter::from_default_env()
            .add_directive(format!("smart_cache={}", config.level).parse()?)
    };

    let fmt_layer = match config.output {
        LogOutput::Stdout => create_fmt_layer(&config, io::stdout),
        LogOutput::Stderr => create_fmt_layer(&config, io::stderr),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

fn create_fmt_layer<W>(
    config: &LoggingConfig,
    make_writer: W,
) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let mut layer = fmt::layer()
        .with_writer(make_writer)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(config.include_thread_names)
        .with_thread_names(config.include_thread_names);

    if config.include_file_location {
        layer = layer.with_file(true).with_line_number(true);
    }

    if config.include_span_events {
        layer = layer.with_span_events(FmtSpan::FULL);
    }

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.output, LogOutput::Stdout);
        assert!(config.include_file_location);
        assert!(!config.include_thread_names);
    }

    #[test]
    fn test_repeated_setup_does_not_panic() {
        let config = LoggingConfig {
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            ..Default::default()
        };
        let _ = setup_logging(config.clone());
        // the second install is rejected instead of panicking
        assert!(setup_logging(config).is_err());
    }
}
