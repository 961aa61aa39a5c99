//! Descriptions of the loggable values of each device type.

use crate::config::ValueConfig;
use std::collections::BTreeMap;
use thiserror::Error;

/// One named element of a value with sub-values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubValue {
    pub name: String,
    pub unit: Option<String>,
}

impl SubValue {
    pub fn new(name: &str, unit: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.map(str::to_string),
        }
    }
}

/// Shape of the value a read returns.
///
/// Units are attached to each sub-value, so names and units always have the
/// same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// A single scalar.
    Scalar { unit: Option<String> },
    /// A list with one element per sub-value.
    Flat(Vec<SubValue>),
    /// A list of groups, each a list with one element per sub-value.
    /// Only one level of nesting exists.
    Nested(Vec<Vec<SubValue>>),
}

impl Shape {
    /// All sub-values in logging order.
    pub fn subvalues(&self) -> Vec<&SubValue> {
        match self {
            Shape::Scalar { .. } => Vec::new(),
            Shape::Flat(subs) => subs.iter().collect(),
            Shape::Nested(groups) => groups.iter().flatten().collect(),
        }
    }
}

/// A loggable value of a device type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDescriptor {
    pub name: String,
    pub shape: Shape,
    /// Hidden by default in configuration front ends
    pub advanced: bool,
}

impl ValueDescriptor {
    pub fn scalar(name: &str, unit: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            shape: Shape::Scalar {
                unit: unit.map(str::to_string),
            },
            advanced: false,
        }
    }

    pub fn flat(name: &str, subvalues: &[(&str, Option<&str>)]) -> Self {
        Self {
            name: name.to_string(),
            shape: Shape::Flat(
                subvalues
                    .iter()
                    .map(|(name, unit)| SubValue::new(name, *unit))
                    .collect(),
            ),
            advanced: false,
        }
    }

    pub fn nested(name: &str, groups: &[&[(&str, Option<&str>)]]) -> Self {
        Self {
            name: name.to_string(),
            shape: Shape::Nested(
                groups
                    .iter()
                    .map(|group| {
                        group
                            .iter()
                            .map(|(name, unit)| SubValue::new(name, *unit))
                            .collect()
                    })
                    .collect(),
            ),
            advanced: false,
        }
    }

    pub fn advanced(mut self) -> Self {
        self.advanced = true;
        self
    }
}

/// Everything the logger knows about one device type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Display name, e.g. "Temperature Bricklet"
    pub type_name: String,
    pub values: Vec<ValueDescriptor>,
    /// Names of the options that can be forwarded to the device
    pub options: Vec<String>,
}

/// A device configuration that does not fit its device type.
#[derive(Error, Debug, PartialEq)]
pub enum SpecMismatch {
    #[error("unknown value \"{0}\"")]
    UnknownValue(String),
    #[error("value \"{value}\" has no sub-values but \"{subvalue}\" is configured")]
    UnexpectedSubvalue { value: String, subvalue: String },
    #[error("value \"{value}\" has no sub-value \"{subvalue}\"")]
    UnknownSubvalue { value: String, subvalue: String },
}

impl DeviceSpec {
    pub fn new(type_name: &str, values: Vec<ValueDescriptor>) -> Self {
        Self {
            type_name: type_name.to_string(),
            values,
            options: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn value(&self, name: &str) -> Option<&ValueDescriptor> {
        self.values.iter().find(|v| v.name == name)
    }

    /// Check configured values and sub-values against this device type.
    ///
    /// Sub-values missing from the configuration are not an error, they
    /// are simply not logged.
    pub fn check(&self, values: &BTreeMap<String, ValueConfig>) -> Result<(), SpecMismatch> {
        for (name, config) in values {
            let descriptor = self
                .value(name)
                .ok_or_else(|| SpecMismatch::UnknownValue(name.clone()))?;

            let known = descriptor.shape.subvalues();
            for subvalue in config.subvalues.keys() {
                if known.is_empty() {
                    return Err(SpecMismatch::UnexpectedSubvalue {
                        value: name.clone(),
                        subvalue: subvalue.clone(),
                    });
                }
                if !known.iter().any(|s| &s.name == subvalue) {
                    return Err(SpecMismatch::UnknownSubvalue {
                        value: name.clone(),
                        subvalue: subvalue.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
