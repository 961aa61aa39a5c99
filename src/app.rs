//! Core application runner for `brick-logger`.
//!
//! This module is decoupled from process setup (logging, signals, exit codes)
//! so a whole session can be run in tests with an injected transport and an
//! injected output stream.

use crate::config::{Config, ConfigError};
use crate::device::Transport;
use crate::logging::ConsoleLogLevel;
use crate::registry::Registry;
use crate::sink::StreamSink;
use crate::supervisor::{Supervisor, SupervisorError};
use clap::Parser;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Consumer name of the `--echo` output.
pub const ECHO: &str = "Echo";

/// Log values of Tinkerforge Bricks and Bricklets as described by a
/// configuration file.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Path to the JSON configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Console log level
    #[arg(long, default_value_t, value_enum)]
    pub console_log_level: ConsoleLogLevel,

    /// Write the CSV data to this file instead of the configured one
    #[arg(long, value_name = "FILE")]
    pub override_csv_file_name: Option<PathBuf>,

    /// Write the debug log to this file instead of the configured one
    #[arg(long, value_name = "FILE")]
    pub override_log_file_name: Option<PathBuf>,

    /// Also print every record to stdout
    #[arg(long)]
    pub echo: bool,
}

/// Errors returned by a logging session.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Load the configuration named by `options` and apply the command line
/// overrides.
pub fn load_config(options: &Options) -> Result<Config, RunError> {
    let mut config = Config::load(&options.config)?;
    if let Some(file_name) = &options.override_csv_file_name {
        config.data.csv.file_name = file_name.clone();
    }
    if let Some(file_name) = &options.override_log_file_name {
        config.debug.log.file_name = file_name.clone();
    }
    Ok(config)
}

/// Log until `shutdown` completes.
///
/// Records go to the configured CSV file and, with `--echo`, to `out` as one
/// line each.
pub async fn run_with_io<F>(
    options: &Options,
    config: Config,
    transport: Arc<dyn Transport>,
    out: Box<dyn Write + Send>,
    shutdown: F,
) -> Result<(), RunError>
where
    F: Future<Output = ()>,
{
    let mut supervisor = Supervisor::new(config, Registry::builtin(), transport);
    if options.echo {
        supervisor.add_sink(ECHO, Box::new(StreamSink::new(out)));
    }

    supervisor.run_until(shutdown).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{GpsFix, SimulatedTransport};
    use crate::test_utils::{FakeDevice, FakeTransport};
    use crate::value::Value;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    /// Output stream that can be read back after the session.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn write_config(dir: &TempDir, devices: serde_json::Value) -> PathBuf {
        let config = serde_json::json!({
            "hosts": { "default": { "name": "localhost", "port": 4223 } },
            "data": {
                "time_format": "de",
                "csv": { "enabled": true, "file_name": dir.path().join("data.csv") },
            },
            "debug": { "log": { "enabled": false, "file_name": "debug.log", "level": "debug" } },
            "devices": devices,
        });
        let path = dir.path().join("config.json");
        std::fs::write(&path, config.to_string()).unwrap();
        path
    }

    fn options(config: PathBuf) -> Options {
        Options {
            config,
            console_log_level: ConsoleLogLevel::None,
            override_csv_file_name: None,
            override_log_file_name: None,
            echo: false,
        }
    }

    fn temperature() -> serde_json::Value {
        serde_json::json!([{
            "name": "Temperature Bricklet",
            "uid": "6Jm9Lh",
            "values": { "Temperature": { "interval": 0.05 } },
        }])
    }

    #[test]
    fn test_cli_parsing() {
        let options = Options::try_parse_from([
            "brick-logger",
            "logger.json",
            "--console-log-level",
            "warning",
            "--override-csv-file-name",
            "other.csv",
            "--echo",
        ])
        .unwrap();

        assert_eq!(options.config, PathBuf::from("logger.json"));
        assert_eq!(options.console_log_level, ConsoleLogLevel::Warning);
        assert_eq!(options.override_csv_file_name, Some(PathBuf::from("other.csv")));
        assert_eq!(options.override_log_file_name, None);
        assert!(options.echo);

        assert!(Options::try_parse_from(["brick-logger"]).is_err());
    }

    #[test]
    fn test_overrides_replace_file_names() {
        let dir = tempdir().unwrap();
        let mut options = options(write_config(&dir, serde_json::json!([])));
        options.override_csv_file_name = Some(dir.path().join("other.csv"));
        options.override_log_file_name = Some(dir.path().join("other.log"));

        let config = load_config(&options).unwrap();
        assert_eq!(config.data.csv.file_name, dir.path().join("other.csv"));
        assert_eq!(config.debug.log.file_name, dir.path().join("other.log"));
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_config(&options(dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::Read { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_writes_csv_and_echo() {
        let dir = tempdir().unwrap();
        let mut options = options(write_config(&dir, temperature()));
        options.echo = true;
        let config = load_config(&options).unwrap();
        let transport = Arc::new(
            FakeTransport::new().with("6Jm9Lh", FakeDevice::new().with("Temperature", Ok(Value::Int(2350)))),
        );
        let out = SharedBuf::default();

        run_with_io(
            &options,
            config,
            transport,
            Box::new(out.clone()),
            tokio::time::sleep(Duration::from_millis(180)),
        )
        .await
        .unwrap();

        let csv = std::fs::read_to_string(dir.path().join("data.csv")).unwrap();
        let echoed = out.contents();
        let rows = csv.lines().count() - 1;
        assert!(rows >= 2, "{csv}");
        assert_eq!(echoed.lines().count(), rows);
        for line in echoed.lines() {
            assert!(line.starts_with("[TIME="), "{line}");
            assert!(line.ends_with(";NAME=Temperature Bricklet;UID=6Jm9Lh;VAR=Temperature;RAW=2350;UNIT=°C/100]"));
        }
    }

    #[tokio::test]
    async fn run_without_echo_leaves_out_untouched() {
        let dir = tempdir().unwrap();
        let options = options(write_config(&dir, temperature()));
        let config = load_config(&options).unwrap();
        let out = SharedBuf::default();

        run_with_io(
            &options,
            config,
            Arc::new(SimulatedTransport::new()),
            Box::new(out.clone()),
            tokio::time::sleep(Duration::from_millis(80)),
        )
        .await
        .unwrap();

        assert!(out.contents().is_empty());
        assert!(dir.path().join("data.csv").exists());
    }

    #[tokio::test]
    async fn run_fails_when_unreachable() {
        let dir = tempdir().unwrap();
        let options = options(write_config(&dir, temperature()));
        let config = load_config(&options).unwrap();

        let err = run_with_io(
            &options,
            config,
            Arc::new(FakeTransport::unreachable()),
            Box::new(io::sink()),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RunError::Supervisor(SupervisorError::Transport(_))));
    }

    #[test]
    fn run_simulated_gps_without_fix() {
        let dir = tempdir().unwrap();
        let devices = serde_json::json!([{
            "name": "GPS Bricklet",
            "uid": "eXt",
            "values": { "Status": { "interval": 0.02, "subvalues": { "Fix": true } } },
        }]);
        let mut options = options(write_config(&dir, devices));
        options.echo = true;
        let config = load_config(&options).unwrap();
        let out = SharedBuf::default();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        runtime
            .block_on(run_with_io(
                &options,
                config,
                Arc::new(SimulatedTransport::with_gps_fix(GpsFix::Never)),
                Box::new(out.clone()),
                tokio::time::sleep(Duration::from_millis(100)),
            ))
            .unwrap();

        let echoed = out.contents();
        assert!(!echoed.is_empty());
        for line in echoed.lines() {
            assert!(line.contains(";VAR=Status;RAW=ERROR[GPS Bricklet-Status]: No fix;UNIT=]"), "{line}");
        }
    }

    #[test]
    fn run_with_no_devices_returns_on_shutdown() {
        let dir = tempdir().unwrap();
        let options = options(write_config(&dir, serde_json::json!([])));
        let config = load_config(&options).unwrap();

        let result = tokio_test::block_on(async {
            run_with_io(
                &options,
                config,
                Arc::new(SimulatedTransport::new()),
                Box::new(io::sink()),
                std::future::ready(()),
            )
            .await
        });

        assert!(result.is_ok());
        let csv = std::fs::read_to_string(dir.path().join("data.csv")).unwrap();
        assert_eq!(csv, "TIME;NAME;UID;VAR;RAW;UNIT\r\n");
    }
}
