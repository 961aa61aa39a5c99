//! Device and transport abstractions.
//!
//! The logger never talks to hardware itself. A [`Transport`] connects to a
//! brickd host and hands out one [`Device`] per configured UID; the device
//! answers named reads. This keeps the scheduling core testable without
//! hardware and keeps wire protocols out of it.

use crate::config::{DeviceOptions, HostConfig};
use crate::descriptor::DeviceSpec;
use crate::uid::Uid;
use crate::value::{ReadError, Value};
use std::sync::Arc;
use thiserror::Error;

/// A connected Brick or Bricklet.
pub trait Device: Send + Sync {
    /// Read the value called `value`. The result must have the shape of the
    /// value's descriptor.
    fn read(&self, value: &str) -> Result<Value, ReadError>;

    /// Forward configured options to the device. Called once after the
    /// device was opened and again whenever the options are reapplied.
    fn apply_options(&self, _options: &DeviceOptions) -> Result<(), ReadError> {
        Ok(())
    }
}

/// Errors raised while connecting or opening devices.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("could not connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("device type \"{0}\" is not supported")]
    UnsupportedDevice(String),
    #[error("could not open device {uid}: {reason}")]
    Open { uid: Uid, reason: String },
}

/// Connection to the daemon that owns the hardware.
pub trait Transport: Send + Sync {
    /// Establish the connection. Failure aborts the logging session.
    fn connect(&self, host: &HostConfig) -> Result<(), TransportError>;

    /// Create the device handle for `uid`. Failure only skips that device.
    fn open(&self, spec: &DeviceSpec, uid: Uid) -> Result<Arc<dyn Device>, TransportError>;

    fn disconnect(&self);
}

/// A device opened for logging, together with the names records carry.
#[derive(Clone)]
pub struct LoggedDevice {
    /// Device type name
    pub name: String,
    /// UID as configured
    pub uid: String,
    pub device: Arc<dyn Device>,
}

impl std::fmt::Debug for LoggedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggedDevice")
            .field("name", &self.name)
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}
