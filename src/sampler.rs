//! Turning one device read into records.
//!
//! A sampler is bound to one value of one device. Each firing reads the
//! value exactly once and expands the result into one record per enabled
//! sub-value. Nothing in here fails: read errors and results of the wrong
//! shape become sentinel records so the log shows the gap.

use crate::descriptor::{Shape, SubValue, ValueDescriptor};
use crate::device::LoggedDevice;
use crate::record::{RawValue, Record};
use crate::router::Router;
use crate::timestamp::TimestampFormat;
use crate::value::Value;
use chrono::{DateTime, Local, TimeZone};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub struct Sampler {
    device: LoggedDevice,
    descriptor: ValueDescriptor,
    /// Sub-value name to enabled flag; missing names are disabled
    enabled: BTreeMap<String, bool>,
    format: Arc<TimestampFormat>,
}

impl Sampler {
    pub fn new(
        device: LoggedDevice,
        descriptor: ValueDescriptor,
        enabled: BTreeMap<String, bool>,
        format: Arc<TimestampFormat>,
    ) -> Self {
        Self {
            device,
            descriptor,
            enabled,
            format,
        }
    }

    pub fn device(&self) -> &LoggedDevice {
        &self.device
    }

    pub fn value_name(&self) -> &str {
        &self.descriptor.name
    }

    /// Read the value now and return its records.
    pub fn sample(&self) -> Vec<Record> {
        self.sample_at(&Local::now())
    }

    /// Read the value and stamp its records with `at`.
    pub fn sample_at<Tz>(&self, at: &DateTime<Tz>) -> Vec<Record>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let timestamp = self.format.format(at);

        match self.device.device.read(&self.descriptor.name) {
            Ok(value) => self.expand(&timestamp, &value),
            Err(error) => {
                debug!(
                    device = %self.device.name,
                    uid = %self.device.uid,
                    value = %self.descriptor.name,
                    %error,
                    "read failed"
                );
                vec![self.sentinel(&timestamp, self.descriptor.name.clone(), &error)]
            }
        }
    }

    /// Sample and publish every record. Returns the number of records.
    pub fn fire(&self, router: &Router) -> usize {
        let records = self.sample();
        let count = records.len();
        for record in records {
            router.publish(record);
        }
        count
    }

    fn expand(&self, timestamp: &str, value: &Value) -> Vec<Record> {
        let mut records = Vec::new();

        match &self.descriptor.shape {
            Shape::Scalar { unit } => {
                records.push(self.record(
                    timestamp,
                    self.descriptor.name.clone(),
                    RawValue::Value(value.clone()),
                    unit.as_deref(),
                ));
            }
            Shape::Flat(subvalues) => {
                for (i, sub) in subvalues.iter().enumerate() {
                    if !self.is_enabled(sub) {
                        continue;
                    }
                    match value.get(i) {
                        Some(element) => records.push(self.subvalue_record(timestamp, sub, element)),
                        None => {
                            records.push(self.mismatch(timestamp, sub, value, &[i]));
                            return records;
                        }
                    }
                }
            }
            Shape::Nested(groups) => {
                for (i, group) in groups.iter().enumerate() {
                    for (k, sub) in group.iter().enumerate() {
                        if !self.is_enabled(sub) {
                            continue;
                        }
                        match value.get(i).and_then(|g| g.get(k)) {
                            Some(element) => {
                                records.push(self.subvalue_record(timestamp, sub, element))
                            }
                            None => {
                                records.push(self.mismatch(timestamp, sub, value, &[i, k]));
                                return records;
                            }
                        }
                    }
                }
            }
        }

        records
    }

    fn is_enabled(&self, sub: &SubValue) -> bool {
        self.enabled.get(&sub.name).copied().unwrap_or(false)
    }

    fn variable_name(&self, sub: &SubValue) -> String {
        format!("{}-{}", self.descriptor.name, sub.name)
    }

    fn subvalue_record(&self, timestamp: &str, sub: &SubValue, element: &Value) -> Record {
        self.record(
            timestamp,
            self.variable_name(sub),
            RawValue::Value(element.clone()),
            sub.unit.as_deref(),
        )
    }

    fn mismatch(&self, timestamp: &str, sub: &SubValue, value: &Value, index: &[usize]) -> Record {
        let index = index
            .iter()
            .map(|i| format!("[{i}]"))
            .collect::<String>();
        let message = format!("no element {index} in {value}");
        debug!(
            device = %self.device.name,
            uid = %self.device.uid,
            value = %self.descriptor.name,
            %message,
            "read returned a value of the wrong shape"
        );
        self.sentinel(timestamp, self.variable_name(sub), &message)
    }

    fn sentinel(&self, timestamp: &str, variable_name: String, message: &dyn fmt::Display) -> Record {
        let raw = format!(
            "ERROR[{}-{}]: {}",
            self.device.name, self.descriptor.name, message
        );
        self.record(timestamp, variable_name, RawValue::Error(raw), None)
    }

    fn record(
        &self,
        timestamp: &str,
        variable_name: String,
        raw_value: RawValue,
        unit: Option<&str>,
    ) -> Record {
        Record {
            timestamp: timestamp.to_string(),
            device_name: self.device.name.clone(),
            device_uid: self.device.uid.clone(),
            variable_name,
            raw_value,
            unit: unit.unwrap_or_default().to_string(),
        }
    }
}
