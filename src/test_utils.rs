use crate::config::{DeviceOptions, HostConfig};
use crate::descriptor::DeviceSpec;
use crate::device::{Device, LoggedDevice, Transport, TransportError};
use crate::record::{RawValue, Record};
use crate::uid::Uid;
use crate::value::{ReadError, Value};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 2024-01-02T03:04:05Z
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
}

/// A record of the "Temp1" temperature bricklet.
pub fn record(variable: &str, value: Value, unit: &str) -> Record {
    Record {
        timestamp: "2024-01-02T03:04:05+00:00".to_string(),
        device_name: "Temperature Bricklet".to_string(),
        device_uid: "Temp1".to_string(),
        variable_name: variable.to_string(),
        raw_value: RawValue::Value(value),
        unit: unit.to_string(),
    }
}

/// A device answering every read of a value with the same scripted result.
#[derive(Debug, Default)]
pub struct FakeDevice {
    results: BTreeMap<String, Result<Value, ReadError>>,
    delay: Duration,
    reads: Arc<AtomicUsize>,
    options: Arc<Mutex<Vec<DeviceOptions>>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, value: &str, result: Result<Value, ReadError>) -> Self {
        self.results.insert(value.to_string(), result);
        self
    }

    /// Make every read take `delay`.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Counter of reads performed so far.
    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }

    /// Options applied so far, oldest first.
    pub fn applied_options(&self) -> Arc<Mutex<Vec<DeviceOptions>>> {
        self.options.clone()
    }
}

impl Device for FakeDevice {
    fn read(&self, value: &str) -> Result<Value, ReadError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.results
            .get(value)
            .cloned()
            .unwrap_or_else(|| Err(ReadError::new(format!("unknown value {value}"))))
    }

    fn apply_options(&self, options: &DeviceOptions) -> Result<(), ReadError> {
        self.options.lock().unwrap().push(options.clone());
        Ok(())
    }
}

pub fn logged(name: &str, device: FakeDevice) -> LoggedDevice {
    LoggedDevice {
        name: name.to_string(),
        uid: "6Jm9Lh".to_string(),
        device: Arc::new(device),
    }
}

/// A transport serving a fixed set of fake devices.
#[derive(Default)]
pub struct FakeTransport {
    devices: BTreeMap<Uid, Arc<FakeDevice>>,
    refuse_connection: bool,
    pub connected: AtomicBool,
    pub disconnected: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, uid: &str, device: FakeDevice) -> Self {
        self.devices.insert(uid.parse().unwrap(), Arc::new(device));
        self
    }

    pub fn unreachable() -> Self {
        Self {
            refuse_connection: true,
            ..Self::default()
        }
    }
}

impl Transport for FakeTransport {
    fn connect(&self, host: &HostConfig) -> Result<(), TransportError> {
        if self.refuse_connection {
            return Err(TransportError::Connect {
                host: host.name.clone(),
                port: host.port,
                reason: "connection refused".to_string(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn open(&self, _spec: &DeviceSpec, uid: Uid) -> Result<Arc<dyn Device>, TransportError> {
        match self.devices.get(&uid) {
            Some(device) => Ok(device.clone()),
            None => Err(TransportError::Open {
                uid,
                reason: "no such device".to_string(),
            }),
        }
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}
