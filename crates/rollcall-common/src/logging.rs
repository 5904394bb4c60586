//! Logging setup for the worker and its tools.
//!
//! Everything logs through `tracing`; this module only decides where the
//! events go. `ROLLCALL_LOG` (same syntax as `RUST_LOG`) overrides the
//! configured filter entirely.

use tracing::Level;
use tracing_subscriber::{
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Environment variable holding a filter override.
pub const LOG_ENV: &str = "ROLLCALL_LOG";

/// HTTP stack crates that are noisy below `warn`.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// Newline-delimited JSON.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for everything not named by a directive.
    pub level: Level,
    pub format: LogFormat,
    /// Print source file and line.
    pub include_location: bool,
    /// Log when handler spans (`dispatch`, ...) close, with their timing.
    pub include_spans: bool,
    /// Extra per-target directives, e.g. `rollcall_sw::fetch=trace`.
    pub directives: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            include_location: false,
            include_spans: false,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Debug level with locations and span timings.
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            include_location: true,
            include_spans: true,
            ..Default::default()
        }
    }

    /// JSON at info level.
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a per-target directive. Malformed directives are skipped.
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
            return filter;
        }

        QUIET_DEPENDENCIES
            .iter()
            .copied()
            .chain(self.directives.iter().map(String::as_str))
            .filter_map(|d| d.parse::<Directive>().ok())
            .fold(EnvFilter::new(self.level.to_string()), EnvFilter::add_directive)
    }
}

/// Install the global subscriber. Returns `false` if one was already set,
/// in which case the existing one stays in place.
pub fn init_logging(config: LogConfig) -> bool {
    let span_events = if config.include_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(span_events)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(config.filter())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_quiet_compact() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.include_spans);
    }

    #[test]
    fn test_verbose_preset() {
        let config = LogConfig::verbose();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_location);
    }

    #[test]
    fn test_directives_accumulate() {
        let config = LogConfig::production()
            .with_directive("rollcall_sw=debug")
            .with_directive("rollcall_net=trace");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.directives, vec!["rollcall_sw=debug", "rollcall_net=trace"]);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_second_init_is_refused() {
        init_logging(LogConfig::default().with_directive("not a directive ==="));
        assert!(!init_logging(LogConfig::production()));
    }
}
