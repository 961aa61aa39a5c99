//! Process-wide log output.
//!
//! Console output goes to stderr so stdout stays free for `--echo`. The
//! debug log file, when enabled in the configuration, gets its own level.

use crate::config::LogConfig;
use clap::ValueEnum;
use std::io;
use std::path::Path;
use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Console log level as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConsoleLogLevel {
    /// No console output
    None,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl ConsoleLogLevel {
    fn filter(self) -> LevelFilter {
        match self {
            ConsoleLogLevel::None => LevelFilter::OFF,
            ConsoleLogLevel::Debug => LevelFilter::DEBUG,
            ConsoleLogLevel::Info => LevelFilter::INFO,
            ConsoleLogLevel::Warning => LevelFilter::WARN,
            ConsoleLogLevel::Error | ConsoleLogLevel::Critical => LevelFilter::ERROR,
        }
    }
}

/// Build the console filter. `RUST_LOG` takes precedence over the command
/// line, unless console output is off.
fn console_filter(level: ConsoleLogLevel) -> EnvFilter {
    if level == ConsoleLogLevel::None {
        return EnvFilter::default().add_directive(LevelFilter::OFF.into());
    }
    EnvFilter::builder()
        .with_default_directive(level.filter().into())
        .from_env_lossy()
}

/// Appender writing to the single file `log.file_name`, never rotated.
fn file_appender(log: &LogConfig) -> io::Result<RollingFileAppender> {
    let directory = match log.file_name.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = log
        .file_name
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log file name is empty"))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .map_err(io::Error::other)
}

/// Build the subscriber: console output plus the optional debug log file.
fn subscriber(
    console: ConsoleLogLevel,
    log: &LogConfig,
) -> io::Result<(impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>)> {
    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(console_filter(console));

    let (file_layer, guard) = if log.enabled {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(log)?);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(LevelFilter::from(tracing::Level::from(log.level)));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer);
    Ok((subscriber, guard))
}

/// Install the global subscriber.
///
/// Fails only if the debug log file cannot be opened. The returned guard
/// flushes the log file when dropped, so it has to live until the session
/// is over. Installing twice is a no-op, the first subscriber stays.
pub fn init(console: ConsoleLogLevel, log: &LogConfig) -> io::Result<Option<WorkerGuard>> {
    let (subscriber, guard) = subscriber(console, log)?;
    let _ = subscriber.try_init();
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use tempfile::tempdir;

    #[test]
    fn test_console_levels() {
        assert_eq!(ConsoleLogLevel::None.filter(), LevelFilter::OFF);
        assert_eq!(ConsoleLogLevel::Warning.filter(), LevelFilter::WARN);
        assert_eq!(ConsoleLogLevel::Critical.filter(), LevelFilter::ERROR);
        assert_eq!(ConsoleLogLevel::default(), ConsoleLogLevel::Info);
    }

    #[test]
    fn test_console_level_names() {
        let level = ConsoleLogLevel::from_str("warning", true).unwrap();
        assert_eq!(level, ConsoleLogLevel::Warning);
        assert!(ConsoleLogLevel::from_str("verbose", true).is_err());
    }

    #[test]
    fn test_unwritable_log_file_is_reported() {
        let dir = tempdir().unwrap();
        // A regular file where the log directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let log = LogConfig {
            enabled: true,
            file_name: blocker.join("debug.log"),
            level: LogLevel::Debug,
        };
        assert!(init(ConsoleLogLevel::None, &log).is_err());
    }

    #[test]
    fn test_log_file_is_written_and_flushed_by_guard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let log = LogConfig {
            enabled: true,
            file_name: path.clone(),
            level: LogLevel::Info,
        };

        let (subscriber, guard) = subscriber(ConsoleLogLevel::None, &log).unwrap();
        assert!(guard.is_some());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(uid = "6Jm9Lh", "device opened");
            tracing::debug!("below the file level");
        });
        drop(guard);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("device opened"), "{content}");
        assert!(!content.contains("below the file level"));
    }

    #[test]
    fn test_disabled_log_file_has_no_guard() {
        let dir = tempdir().unwrap();
        let log = LogConfig {
            enabled: false,
            file_name: dir.path().join("debug.log"),
            level: LogLevel::Debug,
        };

        let (_, guard) = subscriber(ConsoleLogLevel::None, &log).unwrap();
        assert!(guard.is_none());
        assert!(!dir.path().join("debug.log").exists());
    }
}
