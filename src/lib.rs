//! `brick-logger` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup,
//! signals and process exit codes. The logging session itself lives in
//! [`crate::supervisor`], driven by [`crate::app`], where it can be tested
//! deterministically with an injected transport and injected output streams.

pub mod app;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod logging;
pub mod periodic;
pub mod record;
pub mod registry;
pub mod router;
pub mod sampler;
pub mod sim;
pub mod sink;
pub mod supervisor;
pub mod timestamp;
pub mod uid;
pub mod value;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types at the crate root
pub use config::{Config, ConfigError};
pub use descriptor::{DeviceSpec, Shape, SubValue, ValueDescriptor};
pub use device::{Device, LoggedDevice, Transport, TransportError};
pub use periodic::PeriodicTask;
pub use record::{RawValue, Record};
pub use registry::Registry;
pub use router::{ConsumerQueue, Router};
pub use sampler::Sampler;
pub use sink::{CsvWriter, Sink, SinkError, SinkJob, StreamSink};
pub use supervisor::{State, Supervisor, SupervisorError};
pub use timestamp::{TimeFormatKind, TimestampFormat};
pub use uid::{ParseUidError, Uid};
pub use value::{ReadError, Value};
