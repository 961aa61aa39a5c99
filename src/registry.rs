//! Registry of supported device types.

use crate::descriptor::{DeviceSpec, ValueDescriptor};
use std::collections::BTreeMap;

/// Device specs keyed by device type name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    specs: BTreeMap<String, DeviceSpec>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The device types this logger ships with.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for spec in builtin_specs() {
            registry.insert(spec);
        }
        registry
    }

    /// Add or replace a device type.
    pub fn insert(&mut self, spec: DeviceSpec) {
        self.specs.insert(spec.type_name.clone(), spec);
    }

    pub fn get(&self, type_name: &str) -> Option<&DeviceSpec> {
        self.specs.get(type_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn builtin_specs() -> Vec<DeviceSpec> {
    vec![
        DeviceSpec::new(
            "Accelerometer Bricklet",
            vec![
                ValueDescriptor::flat(
                    "Acceleration",
                    &[
                        ("X", Some("g/1000")),
                        ("Y", Some("g/1000")),
                        ("Z", Some("g/1000")),
                    ],
                ),
                ValueDescriptor::scalar("Temperature", Some("°C")).advanced(),
            ],
        )
        .with_options(&["Data Rate", "Full Scale", "Filter Bandwidth"]),
        DeviceSpec::new(
            "GPS Bricklet",
            vec![
                ValueDescriptor::flat(
                    "Coordinates",
                    &[
                        ("Latitude", Some("deg/1000000")),
                        ("NS", None),
                        ("Longitude", Some("deg/1000000")),
                        ("EW", None),
                        ("PDOP", Some("1/100")),
                        ("HDOP", Some("1/100")),
                        ("VDOP", Some("1/100")),
                        ("EPE", Some("cm")),
                    ],
                ),
                ValueDescriptor::flat(
                    "Altitude",
                    &[("Altitude", Some("cm")), ("Geoidal Separation", Some("cm"))],
                ),
                ValueDescriptor::flat("Motion", &[("Course", Some("deg/100")), ("Speed", Some("10m/h"))]),
                ValueDescriptor::flat(
                    "Date Time",
                    &[("Date", Some("ddmmyy")), ("Time", Some("hhmmss|sss"))],
                ),
                ValueDescriptor::flat(
                    "Status",
                    &[("Fix", None), ("Satellites View", None), ("Satellites Used", None)],
                ),
            ],
        ),
        DeviceSpec::new(
            "Humidity Bricklet",
            vec![
                ValueDescriptor::scalar("Humidity", Some("%RH/10")),
                ValueDescriptor::scalar("Analog Value", None).advanced(),
            ],
        ),
        DeviceSpec::new(
            "Industrial Digital In 4 Bricklet",
            vec![
                ValueDescriptor::flat(
                    "Value",
                    &[("Pin 0", None), ("Pin 1", None), ("Pin 2", None), ("Pin 3", None)],
                ),
                ValueDescriptor::scalar("Edge Count (Pin 0)", None).advanced(),
                ValueDescriptor::scalar("Edge Count (Pin 1)", None).advanced(),
                ValueDescriptor::scalar("Edge Count (Pin 2)", None).advanced(),
                ValueDescriptor::scalar("Edge Count (Pin 3)", None).advanced(),
            ],
        ),
        DeviceSpec::new(
            "IMU Brick 2.0",
            vec![
                ValueDescriptor::nested(
                    "All Data",
                    &[
                        &[
                            ("Acceleration X", Some("m/s²/100")),
                            ("Acceleration Y", Some("m/s²/100")),
                            ("Acceleration Z", Some("m/s²/100")),
                        ],
                        &[
                            ("Magnetic Field X", Some("µT/16")),
                            ("Magnetic Field Y", Some("µT/16")),
                            ("Magnetic Field Z", Some("µT/16")),
                        ],
                        &[
                            ("Angular Velocity X", Some("°/s/16")),
                            ("Angular Velocity Y", Some("°/s/16")),
                            ("Angular Velocity Z", Some("°/s/16")),
                        ],
                    ],
                ),
                ValueDescriptor::scalar("Temperature", Some("°C")).advanced(),
            ],
        )
        .with_options(&["Sensor Fusion"]),
        DeviceSpec::new(
            "Temperature Bricklet",
            vec![ValueDescriptor::scalar("Temperature", Some("°C/100"))],
        )
        .with_options(&["I2C Mode"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Shape;

    #[test]
    fn test_builtin_lookup() {
        let registry = Registry::builtin();
        assert_eq!(registry.len(), 6);

        let temperature = registry.get("Temperature Bricklet").unwrap();
        assert_eq!(
            temperature.value("Temperature").unwrap().shape,
            Shape::Scalar {
                unit: Some("°C/100".to_string())
            }
        );
        assert!(registry.get("Laser Range Finder Bricklet").is_none());
    }

    #[test]
    fn test_builtin_value_names_are_unique() {
        for spec in Registry::builtin().iter() {
            let mut names: Vec<_> = spec.values.iter().map(|v| &v.name).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), spec.values.len(), "{}", spec.type_name);

            for value in &spec.values {
                let mut subs: Vec<_> = value.shape.subvalues().iter().map(|s| &s.name).collect();
                let count = subs.len();
                subs.sort();
                subs.dedup();
                assert_eq!(subs.len(), count, "{} / {}", spec.type_name, value.name);
            }
        }
    }

    #[test]
    fn test_imu_all_data_is_nested() {
        let registry = Registry::builtin();
        let imu = registry.get("IMU Brick 2.0").unwrap();
        match &imu.value("All Data").unwrap().shape {
            Shape::Nested(groups) => {
                assert_eq!(groups.len(), 3);
                assert!(groups.iter().all(|g| g.len() == 3));
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_insert_replaces() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());
        registry.insert(DeviceSpec::new("X", vec![]));
        registry.insert(DeviceSpec::new(
            "X",
            vec![ValueDescriptor::scalar("Value", None)],
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("X").unwrap().values.len(), 1);
    }
}
