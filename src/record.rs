//! The normalized record flowing from the samplers to the sinks.

use crate::value::Value;
use std::fmt;

/// The logged value of a record: either what the device returned or the
/// sentinel error string that replaced it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Value(Value),
    Error(String),
}

impl RawValue {
    pub fn is_error(&self) -> bool {
        matches!(self, RawValue::Error(_))
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Value(value) => write!(f, "{value}"),
            RawValue::Error(message) => f.write_str(message),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        RawValue::Value(value)
    }
}

/// One sample of one (sub-)value of one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Time of the firing, already formatted with the session's time format
    pub timestamp: String,
    /// Device type name, e.g. "Temperature Bricklet"
    pub device_name: String,
    /// UID of the device as configured
    pub device_uid: String,
    /// Value name, or "<value>-<sub-value>" for expanded sub-values
    pub variable_name: String,
    pub raw_value: RawValue,
    /// Unit annotation, empty when the value has none
    pub unit: String,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[TIME={};NAME={};UID={};VAR={};RAW={};UNIT={}]",
            self.timestamp,
            self.device_name,
            self.device_uid,
            self.variable_name,
            self.raw_value,
            self.unit
        )
    }
}
