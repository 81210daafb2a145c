//! Sensor-capability boundary.
//!
//! Streaming and control of individual sensors live outside the network core.
//! The core only resolves a sensor's type tag to a registered constructor and
//! seeds it with the metadata the sensor was announced with.

use common::{DataFormat, NetworkError, Result, SensorRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type tags with a descriptor handle available out of the box.
pub const KNOWN_SENSOR_TYPES: &[&str] = &["video", "annotate", "imu", "gaze", "event"];

/// Receives notifications emitted by a constructed sensor.
pub type SensorCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Everything a sensor constructor is seeded with.
#[derive(Clone)]
pub struct SensorSettings {
    pub format: DataFormat,
    pub record: SensorRecord,
    pub callbacks: Vec<SensorCallback>,
}

impl fmt::Debug for SensorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorSettings")
            .field("format", &self.format)
            .field("record", &self.record)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

pub trait SensorHandle: Send {
    fn record(&self) -> &SensorRecord;

    fn format(&self) -> DataFormat;

    fn sensor_uuid(&self) -> &str {
        &self.record().sensor_uuid
    }

    fn sensor_type(&self) -> &str {
        &self.record().sensor_type
    }
}

pub type SensorConstructor =
    Arc<dyn Fn(SensorSettings) -> Result<Box<dyn SensorHandle>> + Send + Sync>;

/// Closed table from sensor type tag to constructor.
#[derive(Clone, Default)]
pub struct SensorTypeMap {
    constructors: HashMap<String, SensorConstructor>,
}

impl SensorTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with a [`SensorDescriptor`] constructor for every known tag.
    pub fn descriptors() -> Self {
        let mut map = Self::new();
        for tag in KNOWN_SENSOR_TYPES {
            map.register(*tag, |settings| {
                Ok(Box::new(SensorDescriptor::new(settings)) as Box<dyn SensorHandle>)
            });
        }
        map
    }

    pub fn register<F>(&mut self, sensor_type: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(SensorSettings) -> Result<Box<dyn SensorHandle>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(sensor_type.into(), Arc::new(constructor));
        self
    }

    pub fn supports(&self, sensor_type: &str) -> bool {
        self.constructors.contains_key(sensor_type)
    }

    pub fn build(&self, settings: SensorSettings) -> Result<Box<dyn SensorHandle>> {
        let constructor = self
            .constructors
            .get(&settings.record.sensor_type)
            .ok_or_else(|| {
                NetworkError::UnsupportedSensorType(settings.record.sensor_type.clone())
            })?;
        constructor(settings)
    }
}

impl fmt::Debug for SensorTypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.constructors.keys().collect();
        tags.sort();
        f.debug_struct("SensorTypeMap").field("types", &tags).finish()
    }
}

/// Metadata-only handle: knows what the sensor is and relays notifications.
pub struct SensorDescriptor {
    settings: SensorSettings,
}

impl SensorDescriptor {
    pub fn new(settings: SensorSettings) -> Self {
        Self { settings }
    }

    pub fn notify(&self, notification: &Value) {
        for callback in &self.settings.callbacks {
            callback(notification);
        }
    }
}

impl SensorHandle for SensorDescriptor {
    fn record(&self) -> &SensorRecord {
        &self.settings.record
    }

    fn format(&self) -> DataFormat {
        self.settings.format
    }
}
