use common::SensorRecord;
use std::collections::BTreeMap;

/// Sensors currently attached on one discovery channel, keyed by uuid.
///
/// Owned by a single group node and only touched from its poll path.
#[derive(Debug, Default, Clone)]
pub struct SensorRegistry {
    sensors: BTreeMap<String, SensorRecord>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sensor_uuid: &str) -> Option<&SensorRecord> {
        self.sensors.get(sensor_uuid)
    }

    pub fn contains(&self, sensor_uuid: &str) -> bool {
        self.sensors.contains_key(sensor_uuid)
    }

    pub fn put(&mut self, sensor_uuid: impl Into<String>, record: SensorRecord) {
        self.sensors.insert(sensor_uuid.into(), record);
    }

    pub fn remove(&mut self, sensor_uuid: &str) -> Option<SensorRecord> {
        self.sensors.remove(sensor_uuid)
    }

    pub fn all(&self) -> impl Iterator<Item = (&String, &SensorRecord)> {
        self.sensors.iter()
    }

    /// Records announced by the given host, in uuid order.
    pub fn owned_by(&self, host_uuid: &str) -> Vec<SensorRecord> {
        self.sensors
            .values()
            .filter(|record| record.host_uuid == host_uuid)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}
