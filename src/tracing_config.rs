//! Structured logging setup.
//!
//! The library only emits `tracing` events and spans. The `removebg` binary
//! installs a subscriber through [`TracingConfig`], which is compiled with the
//! `cli` feature.

use crate::config::ReturnFormat;
use std::path::PathBuf;

/// Log line layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum TracingFormat {
    /// Compact lines with ANSI colors when writing to a terminal
    #[default]
    Console,
    /// Compact lines without colors, for CI logs
    Compact,
    /// One JSON object per event, including the active span list
    Json,
}

/// Where log lines go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TracingOutput {
    #[default]
    Stderr,
    /// Append to a file; the parent directory must exist
    File(PathBuf),
}

/// Subscriber settings for binaries
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Number of `-v` flags
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// `EnvFilter` directives; when set, verbosity is ignored
    pub filter: Option<String>,
    /// Logged once after installation to correlate a run
    pub session_id: Option<String>,
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Filter directives in effect: the explicit filter, else a level from verbosity
    pub fn filter_directives(&self) -> String {
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            return filter.to_string();
        }
        let level = match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        level.to_string()
    }

    /// Colors only make sense for the console layout on stderr
    pub fn uses_ansi(&self) -> bool {
        self.format == TracingFormat::Console && self.output == TracingOutput::Stderr
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directives
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_new(self.filter_directives())?;
        let writer = match &self.output {
            TracingOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            TracingOutput::File(path) => {
                let directory = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or_else(|| std::path::Path::new("."));
                let file_name = path.file_name().ok_or_else(|| {
                    anyhow::anyhow!("Log file path has no file name: {}", path.display())
                })?;
                BoxMakeWriter::new(tracing_appender::rolling::never(directory, file_name))
            },
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(self.uses_ansi())
            .with_target(false);
        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            TracingFormat::Console | TracingFormat::Compact => {
                registry.with(layer.compact()).try_init()?;
            },
            TracingFormat::Json => {
                registry
                    .with(layer.json().with_current_span(true).with_span_list(true))
                    .try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "remove.bg session started");
        }
        Ok(())
    }
}

/// Span helpers shared by the async and blocking clients
pub mod spans {
    use super::ReturnFormat;
    use tracing::{Level, Span};

    pub fn removal(source: &str, format: ReturnFormat) -> Span {
        tracing::span!(Level::INFO, "removebg", source = %source, format = %format)
    }

    pub fn account(url: &str) -> Span {
        tracing::span!(Level::INFO, "account", url = %url)
    }

    pub fn save(path: &std::path::Path) -> Span {
        tracing::span!(Level::DEBUG, "save", path = %path.display())
    }
}
