//! Lifecycle of one logging session.
//!
//! The supervisor turns a [`Config`] into running work: one periodic task per
//! configured (device, value) pair, publishing into the [`Router`], and one
//! sink job per destination draining its queue. Start brings up the sinks
//! before the tasks and stop tears them down in the reverse order, so no
//! record is produced without a consumer to receive it and every record
//! produced is written before the session ends.

use crate::config::{Config, DeviceConfig, DeviceOptions};
use crate::device::{LoggedDevice, Transport, TransportError};
use crate::periodic::PeriodicTask;
use crate::registry::Registry;
use crate::router::Router;
use crate::sampler::Sampler;
use crate::sink::{CsvWriter, Sink, SinkError, SinkJob};
use crate::uid::Uid;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, warn};

/// Consumer name of the CSV file sink.
pub const CSV_WRITER: &str = "CSV-Writer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Running,
    Stopping,
    Stopped,
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("could not open csv file: {0}")]
    Csv(#[from] SinkError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("logger can only be started once (state is {0:?})")]
    AlreadyStarted(State),
}

/// A device ready for logging, with the options to forward to it.
struct Prepared {
    device: LoggedDevice,
    options: DeviceOptions,
}

pub struct Supervisor {
    config: Config,
    registry: Registry,
    transport: Arc<dyn Transport>,
    router: Router,
    state: State,
    sinks: Vec<(String, Box<dyn Sink>)>,
    jobs: Vec<SinkJob>,
    tasks: Vec<PeriodicTask>,
    devices: Vec<Prepared>,
}

impl Supervisor {
    pub fn new(config: Config, registry: Registry, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            registry,
            transport,
            router: Router::new(),
            state: State::Created,
            sinks: Vec::new(),
            jobs: Vec::new(),
            tasks: Vec::new(),
            devices: Vec::new(),
        }
    }

    /// Add a destination next to the CSV file. Only effective before
    /// [`start`](Self::start).
    pub fn add_sink(&mut self, name: &str, sink: Box<dyn Sink>) {
        if self.state != State::Created {
            warn!(job = name, "sink added after start is ignored");
            return;
        }
        self.sinks.push((name.to_string(), sink));
    }

    /// The router records are published to. Consumers registered here
    /// receive every record produced after their registration.
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Number of devices that are being logged.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of periodic tasks, including disabled ones.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Bring up the session.
    ///
    /// Failing to connect the transport or to open the CSV file is fatal:
    /// nothing is started and the supervisor ends in [`State::Stopped`]. The
    /// CSV file is only created once the connection stands.
    /// Devices that cannot be set up are skipped with a warning.
    pub async fn start(&mut self) -> Result<(), SupervisorError> {
        if self.state != State::Created {
            return Err(SupervisorError::AlreadyStarted(self.state));
        }

        // Config::from_json guarantees the default host
        if let Some(host) = self.config.default_host() {
            if let Err(e) = self.transport.connect(host) {
                self.state = State::Stopped;
                return Err(e.into());
            }
            info!(host = %host.name, port = host.port, "connection established");
        }

        if let Err(e) = self.open_csv() {
            self.transport.disconnect();
            self.state = State::Stopped;
            return Err(e);
        }

        let format = Arc::new(self.config.data.timestamp_format());
        let mut samplers = Vec::new();
        for device in &self.config.devices {
            match self.prepare(device) {
                Some(prepared) => {
                    for (value, config) in &device.values {
                        // prepare() checked every configured value
                        let Some(descriptor) = self
                            .registry
                            .get(&device.name)
                            .and_then(|spec| spec.value(value))
                        else {
                            continue;
                        };
                        let sampler = Sampler::new(
                            prepared.device.clone(),
                            descriptor.clone(),
                            config.subvalues.clone(),
                            format.clone(),
                        );
                        samplers.push((sampler, config.interval));
                    }
                    self.devices.push(prepared);
                }
                None => continue,
            }
        }

        self.apply_options();

        for (name, sink) in self.sinks.drain(..) {
            let queue = self.router.register(&name);
            self.jobs.push(SinkJob::spawn(&name, queue, sink));
        }

        for (sampler, interval) in samplers {
            let mut task = PeriodicTask::new(interval);
            if !task.is_enabled() {
                debug!(
                    device = %sampler.device().name,
                    value = sampler.value_name(),
                    "interval is 0, value is not logged"
                );
            }
            let router = self.router.clone();
            let span = info_span!(
                "sampler",
                device = %sampler.device().name,
                uid = %sampler.device().uid,
                value = sampler.value_name()
            );
            task.start(move || {
                let _enter = span.enter();
                sampler.fire(&router);
            });
            self.tasks.push(task);
        }

        self.state = State::Running;
        info!(
            devices = self.devices.len(),
            tasks = self.tasks.len(),
            jobs = self.jobs.len(),
            "data logger started"
        );
        Ok(())
    }

    /// Shut the session down: stop and join every task, then close every
    /// sink queue and wait for its job to write out what is left, then
    /// disconnect. Stopping a supervisor that is not running does nothing.
    pub async fn stop(&mut self) {
        if self.state != State::Running {
            return;
        }
        self.state = State::Stopping;
        info!("stopping data logger");

        for task in &self.tasks {
            task.stop();
        }
        for task in &mut self.tasks {
            task.join().await;
        }
        self.tasks.clear();

        for job in &self.jobs {
            self.router.unregister(job.name());
        }
        for job in self.jobs.drain(..) {
            let name = job.name().to_string();
            let written = job
                .join()
                .instrument(info_span!("sink", job = %name))
                .await;
            debug!(job = %name, written, "sink job joined");
        }

        self.transport.disconnect();
        self.state = State::Stopped;
        info!("data logger stopped");
    }

    /// Forward each device's configured options to it again.
    pub fn apply_options(&self) {
        for prepared in &self.devices {
            if prepared.options.is_empty() {
                continue;
            }
            if let Err(e) = prepared.device.device.apply_options(&prepared.options) {
                warn!(
                    device = %prepared.device.name,
                    uid = %prepared.device.uid,
                    error = %e,
                    "could not apply device options"
                );
            }
        }
    }

    /// Start, log until `shutdown` completes, stop.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), SupervisorError>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await;
        Ok(())
    }

    fn open_csv(&mut self) -> Result<(), SupervisorError> {
        let csv = &self.config.data.csv;
        if !csv.enabled {
            return Ok(());
        }
        let writer = CsvWriter::open(&csv.file_name, csv.file_size, csv.file_count)?;
        info!(path = %writer.path().display(), "writing csv file");
        let sink: Box<dyn Sink> = Box::new(writer);
        self.sinks.insert(0, (CSV_WRITER.to_string(), sink));
        Ok(())
    }

    fn prepare(&self, config: &DeviceConfig) -> Option<Prepared> {
        let skip = |reason: &dyn std::fmt::Display| {
            warn!(
                device = %config.name,
                uid = %config.uid,
                reason = %reason,
                "device is not logged"
            );
        };

        let uid: Uid = match config.uid.parse() {
            Ok(uid) => uid,
            Err(e) => {
                skip(&format_args!("invalid UID: {e}"));
                return None;
            }
        };
        let Some(spec) = self.registry.get(&config.name) else {
            skip(&TransportError::UnsupportedDevice(config.name.clone()));
            return None;
        };
        if let Err(e) = spec.check(&config.values) {
            skip(&e);
            return None;
        }
        let device = match self.transport.open(spec, uid) {
            Ok(device) => device,
            Err(e) => {
                skip(&e);
                return None;
            }
        };

        debug!(device = %config.name, uid = %config.uid, "device opened");
        Some(Prepared {
            device: LoggedDevice {
                name: config.name.clone(),
                uid: config.uid.clone(),
                device,
            },
            options: config.options.clone(),
        })
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.state == State::Running {
            warn!("data logger dropped while running, records may be lost");
            for task in &self.tasks {
                task.stop();
            }
        }
    }
}
