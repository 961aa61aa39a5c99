//! A transport without hardware.
//!
//! Serves every device type with synthetic readings of the right shape.
//! Readings are a deterministic function of the device UID, the position of
//! the sub-value and the number of reads so far, so runs are reproducible.

use crate::config::{DeviceOptions, HostConfig};
use crate::descriptor::{DeviceSpec, Shape};
use crate::device::{Device, Transport, TransportError};
use crate::uid::Uid;
use crate::value::{ReadError, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info};

const GPS: &str = "GPS Bricklet";

/// How simulated GPS receivers behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpsFix {
    /// Every fourth read fails with "No fix".
    #[default]
    Intermittent,
    /// Every read fails with "No fix".
    Never,
}

#[derive(Debug, Default)]
pub struct SimulatedTransport {
    gps_fix: GpsFix,
    connected: AtomicBool,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gps_fix(gps_fix: GpsFix) -> Self {
        Self {
            gps_fix,
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Transport for SimulatedTransport {
    fn connect(&self, host: &HostConfig) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        info!(host = %host.name, port = host.port, "using simulated devices");
        Ok(())
    }

    fn open(&self, spec: &DeviceSpec, uid: Uid) -> Result<Arc<dyn Device>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Open {
                uid,
                reason: "not connected".to_string(),
            });
        }
        Ok(Arc::new(SimulatedDevice {
            spec: spec.clone(),
            uid,
            gps_fix: self.gps_fix,
            reads: AtomicU64::new(0),
        }))
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct SimulatedDevice {
    spec: DeviceSpec,
    uid: Uid,
    gps_fix: GpsFix,
    reads: AtomicU64,
}

impl SimulatedDevice {
    fn reading(&self, position: u64, n: u64) -> Value {
        let base = i64::from(self.uid.0 % 1000) * 10;
        Value::Int(base + position as i64 * 100 + (n % 50) as i64)
    }
}

impl Device for SimulatedDevice {
    fn read(&self, value: &str) -> Result<Value, ReadError> {
        let descriptor = self
            .spec
            .value(value)
            .ok_or_else(|| ReadError::new(format!("{} has no value {value}", self.spec.type_name)))?;
        let n = self.reads.fetch_add(1, Ordering::Relaxed);

        if self.spec.type_name == GPS {
            let fixed = match self.gps_fix {
                GpsFix::Intermittent => n % 4 != 3,
                GpsFix::Never => false,
            };
            if !fixed {
                return Err(ReadError::new("No fix"));
            }
        }

        Ok(match &descriptor.shape {
            Shape::Scalar { .. } => self.reading(0, n),
            Shape::Flat(subs) => Value::List((0..subs.len() as u64).map(|i| self.reading(i, n)).collect()),
            Shape::Nested(groups) => {
                let mut position = 0;
                Value::List(
                    groups
                        .iter()
                        .map(|group| {
                            Value::List(
                                group
                                    .iter()
                                    .map(|_| {
                                        position += 1;
                                        self.reading(position - 1, n)
                                    })
                                    .collect(),
                            )
                        })
                        .collect(),
                )
            }
        })
    }

    fn apply_options(&self, options: &DeviceOptions) -> Result<(), ReadError> {
        for (name, option) in options {
            if !self.spec.options.contains(name) {
                return Err(ReadError::new(format!(
                    "{} has no option {name}",
                    self.spec.type_name
                )));
            }
            debug!(uid = %self.uid, option = %name, value = %option.value, "option applied");
        }
        Ok(())
    }
}
