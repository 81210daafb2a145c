use super::interpreter::{EventInterpreter, Outcome};
use super::registry::SensorRegistry;
use super::version::VersionGate;
use super::Callback;
use crate::sensor::{SensorCallback, SensorHandle, SensorSettings, SensorTypeMap};
use crate::transport::{Transport, TransportFactory};
use common::{
    group_name_from_format, DataFormat, DomainEvent, NetworkConfig, NetworkError, Result,
    SensorRecord,
};
use log::debug;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Discovery channel for a single wire format.
///
/// Stopped until `start()` acquires a transport session; `stop()` releases it
/// again and the node may be started anew.
pub struct GroupNode {
    format: DataFormat,
    name: Option<String>,
    headers: Vec<(String, String)>,
    factory: Arc<dyn TransportFactory>,
    sensor_types: SensorTypeMap,
    session: Option<Box<dyn Transport>>,
    registry: SensorRegistry,
    interpreter: EventInterpreter,
    callbacks: Vec<Callback>,
}

impl GroupNode {
    pub fn new(
        format: DataFormat,
        config: &NetworkConfig,
        factory: Arc<dyn TransportFactory>,
        sensor_types: SensorTypeMap,
        callbacks: Vec<Callback>,
    ) -> Self {
        Self {
            format,
            name: config.name.clone(),
            headers: config.headers.clone(),
            factory,
            sensor_types,
            session: None,
            registry: SensorRegistry::new(),
            interpreter: EventInterpreter::new(format),
            callbacks,
        }
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn group(&self) -> &'static str {
        group_name_from_format(self.format)
    }

    /// Requested name before `start()`, transport-assigned name after.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.session.as_ref().map(|session| session.uuid())
    }

    pub fn callbacks(&self) -> &[Callback] {
        &self.callbacks
    }

    pub fn set_callbacks(&mut self, callbacks: Vec<Callback>) {
        self.callbacks = callbacks;
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn version_gate(&self) -> &VersionGate {
        self.interpreter.gate()
    }

    /// Does nothing when the node already holds a session.
    pub fn start(&mut self) -> Result<()> {
        if self.running() {
            debug!("Network for {} already running", self.group());
            return Ok(());
        }
        debug!("Starting network for {}...", self.group());
        let mut session = self.factory.acquire(self.name.as_deref())?;
        self.name = Some(session.name());
        for (key, value) in &self.headers {
            session.set_header(key, value)?;
        }
        session.join(self.group())?;
        session.start()?;
        self.session = Some(session);
        Ok(())
    }

    /// Tells observers every known sensor is gone, then re-enters the group.
    pub fn rejoin(&mut self) -> Result<()> {
        let known: Vec<SensorRecord> =
            self.registry.all().map(|(_, record)| record.clone()).collect();
        for record in known {
            self.interpreter
                .dispatch(DomainEvent::Detach(record), &mut self.registry, &self.callbacks)?;
        }
        let group = self.group();
        if let Some(session) = self.session.as_mut() {
            session.leave(group)?;
            session.join(group)?;
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        debug!("Stopping network for {}...", self.group());
        match self.session.take() {
            Some(mut session) => {
                let left = session.leave(self.group());
                let stopped = session.stop();
                left.and(stopped)
            }
            None => Ok(()),
        }
    }

    /// Handles at most one pending event.
    pub fn poll(&mut self) -> Result<Option<Outcome>> {
        let session = match self.session.as_mut() {
            Some(session) if session.has_pending_event() => session,
            _ => return Ok(None),
        };
        let event = session.next_event()?;
        self.interpreter
            .interpret(event, &mut self.registry, &self.callbacks)
            .map(Some)
    }

    pub fn has_events(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| session.has_pending_event())
    }

    pub fn running(&self) -> bool {
        self.session.is_some()
    }

    pub fn contains(&self, sensor_uuid: &str) -> bool {
        self.registry.contains(sensor_uuid)
    }

    pub fn sensors(&self) -> Vec<SensorRecord> {
        self.registry.all().map(|(_, record)| record.clone()).collect()
    }

    pub fn sensor(
        &self,
        sensor_uuid: &str,
        callbacks: Vec<SensorCallback>,
    ) -> Result<Box<dyn SensorHandle>> {
        let record = self
            .registry
            .get(sensor_uuid)
            .ok_or_else(|| NetworkError::NotFound(sensor_uuid.to_string()))?;
        self.sensor_types.build(SensorSettings {
            format: self.format,
            record: record.clone(),
            callbacks,
        })
    }
}

impl fmt::Display for GroupNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uuid = self
            .uuid()
            .map(|uuid| uuid.simple().to_string())
            .unwrap_or_else(|| "stopped".to_string());
        write!(
            f,
            "<{} {} [{}]>",
            module_path!(),
            self.name.as_deref().unwrap_or("-"),
            uuid
        )
    }
}
