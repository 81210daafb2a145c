//! Turns raw group events into attach/detach notifications.
//!
//! Every surviving event is applied to the registry first and then handed to
//! the observers in registration order. Bad input never escapes this module;
//! the worst case is a single dropped event. Observer failures do escape, after
//! the registry already reflects the event.

use super::registry::SensorRegistry;
use super::version::{VersionGate, VersionSkew};
use super::Callback;
use common::{
    parse_payload, DataFormat, DomainEvent, NetworkError, RawEvent, RawEventKind, Result,
};
use log::{debug, warn};

/// Why an event produced no notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MalformedMessage,
    UnknownSubject,
    DuplicateAttach,
    UnknownDetach,
}

/// Result of interpreting one raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Number of domain events delivered to observers.
    Dispatched(usize),
    Dropped(DropReason),
    Joined(Option<VersionSkew>),
    Ignored,
}

#[derive(Debug, Clone)]
pub struct EventInterpreter {
    format: DataFormat,
    gate: VersionGate,
}

impl EventInterpreter {
    pub fn new(format: DataFormat) -> Self {
        Self::with_gate(format, VersionGate::default())
    }

    pub fn with_gate(format: DataFormat, gate: VersionGate) -> Self {
        Self { format, gate }
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn gate(&self) -> &VersionGate {
        &self.gate
    }

    pub fn interpret(
        &mut self,
        event: RawEvent,
        registry: &mut SensorRegistry,
        callbacks: &[Callback],
    ) -> Result<Outcome> {
        match event.kind {
            RawEventKind::Shout | RawEventKind::Whisper => {
                self.handle_message(&event, registry, callbacks)
            }
            RawEventKind::Join => {
                let group = event.group.as_deref().unwrap_or("");
                Ok(Outcome::Joined(self.gate.observe(group)))
            }
            RawEventKind::Exit => self.handle_exit(&event, registry, callbacks),
            RawEventKind::Other(_) => {
                debug!("Dropping {:?}", event);
                Ok(Outcome::Ignored)
            }
        }
    }

    fn handle_message(
        &self,
        event: &RawEvent,
        registry: &mut SensorRegistry,
        callbacks: &[Callback],
    ) -> Result<Outcome> {
        let message = match parse_payload(&event.frames, &event.peer_hex(), &event.peer_name) {
            Ok(message) => message,
            Err(NetworkError::MalformedMessage(detail)) => {
                warn!("Malformed message from {}: {}", event.peer_name, detail);
                return Ok(Outcome::Dropped(DropReason::MalformedMessage));
            }
            Err(e) => return Err(e),
        };

        let message = match message {
            DomainEvent::Attach(record) => {
                if registry.contains(&record.sensor_uuid) {
                    debug!("Sensor {} already attached", record.sensor_uuid);
                    return Ok(Outcome::Dropped(DropReason::DuplicateAttach));
                }
                DomainEvent::Attach(record)
            }
            DomainEvent::Detach(notice) => match registry.get(&notice.sensor_uuid) {
                Some(stored) => DomainEvent::Detach(notice.merge_stored(stored)),
                None => {
                    debug!("Sensor {} already detached", notice.sensor_uuid);
                    return Ok(Outcome::Dropped(DropReason::UnknownDetach));
                }
            },
            DomainEvent::Unknown { raw } => {
                debug!("Unknown host message: {}", serde_json::Value::Object(raw));
                return Ok(Outcome::Dropped(DropReason::UnknownSubject));
            }
        };

        self.dispatch(message, registry, callbacks)?;
        Ok(Outcome::Dispatched(1))
    }

    fn handle_exit(
        &self,
        event: &RawEvent,
        registry: &mut SensorRegistry,
        callbacks: &[Callback],
    ) -> Result<Outcome> {
        let gone = registry.owned_by(&event.peer_hex());
        if !gone.is_empty() {
            debug!("Peer {} left with {} sensor(s)", event.peer_name, gone.len());
        }
        let count = gone.len();
        for record in gone {
            self.dispatch(DomainEvent::Detach(record), registry, callbacks)?;
        }
        Ok(Outcome::Dispatched(count))
    }

    /// Applies the event to the registry, then notifies every observer.
    pub fn dispatch(
        &self,
        event: DomainEvent,
        registry: &mut SensorRegistry,
        callbacks: &[Callback],
    ) -> Result<()> {
        match &event {
            DomainEvent::Attach(record) => {
                registry.put(record.sensor_uuid.clone(), record.clone());
            }
            DomainEvent::Detach(record) => {
                registry.remove(&record.sensor_uuid);
            }
            DomainEvent::Unknown { .. } => return Ok(()),
        }
        for callback in callbacks {
            callback(self.format, &event)?;
        }
        Ok(())
    }
}
