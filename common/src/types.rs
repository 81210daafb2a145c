use crate::error::{NetworkError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

pub const SUBJECT_ATTACH: &str = "attach";
pub const SUBJECT_DETACH: &str = "detach";

fn default_sensor_type() -> String {
    "unknown".to_string()
}

/// One sensor advertised by a peer.
///
/// Keys outside the well-known set are kept verbatim in `attributes` and
/// written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub sensor_uuid: String,
    #[serde(default)]
    pub sensor_name: String,
    #[serde(default = "default_sensor_type")]
    pub sensor_type: String,
    #[serde(default)]
    pub host_uuid: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl SensorRecord {
    pub fn new(
        sensor_uuid: impl Into<String>,
        sensor_name: impl Into<String>,
        sensor_type: impl Into<String>,
    ) -> Self {
        Self {
            sensor_uuid: sensor_uuid.into(),
            sensor_name: sensor_name.into(),
            sensor_type: sensor_type.into(),
            host_uuid: String::new(),
            host_name: String::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_host(mut self, host_uuid: impl Into<String>, host_name: impl Into<String>) -> Self {
        self.host_uuid = host_uuid.into();
        self.host_name = host_name.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Overlays the stored record onto a detach notice.
    ///
    /// Stored fields win; keys only present on the notice are kept.
    pub fn merge_stored(mut self, stored: &SensorRecord) -> Self {
        self.sensor_uuid = stored.sensor_uuid.clone();
        self.sensor_name = stored.sensor_name.clone();
        self.sensor_type = stored.sensor_type.clone();
        self.host_uuid = stored.host_uuid.clone();
        self.host_name = stored.host_name.clone();
        self.attributes.remove("sensor_name");
        self.attributes.remove("sensor_type");
        for (key, value) in &stored.attributes {
            self.attributes.insert(key.clone(), value.clone());
        }
        self
    }
}

/// Typed view of a discovery message.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Attach(SensorRecord),
    Detach(SensorRecord),
    Unknown { raw: Map<String, Value> },
}

impl DomainEvent {
    pub fn subject(&self) -> &str {
        match self {
            DomainEvent::Attach(_) => SUBJECT_ATTACH,
            DomainEvent::Detach(_) => SUBJECT_DETACH,
            DomainEvent::Unknown { raw } => raw
                .get("subject")
                .and_then(Value::as_str)
                .unwrap_or(""),
        }
    }

    pub fn record(&self) -> Option<&SensorRecord> {
        match self {
            DomainEvent::Attach(record) | DomainEvent::Detach(record) => Some(record),
            DomainEvent::Unknown { .. } => None,
        }
    }

    pub fn sensor_uuid(&self) -> Option<&str> {
        match self {
            DomainEvent::Unknown { raw } => raw.get("sensor_uuid").and_then(Value::as_str),
            _ => self.record().map(|record| record.sensor_uuid.as_str()),
        }
    }

    /// Encodes the event as the JSON mapping peers put on the wire.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let map = match self {
            DomainEvent::Attach(record) | DomainEvent::Detach(record) => {
                let mut map = match serde_json::to_value(record)? {
                    Value::Object(map) => map,
                    other => {
                        return Err(NetworkError::Serialization(format!(
                            "sensor record encoded as {}",
                            other
                        )))
                    }
                };
                map.insert("subject".to_string(), Value::from(self.subject()));
                map
            }
            DomainEvent::Unknown { raw } => raw.clone(),
        };
        Ok(serde_json::to_vec(&Value::Object(map))?)
    }
}

/// Decodes the first frame of a SHOUT/WHISPER into a domain event.
///
/// `host_uuid` and `host_name` always come from the transport, whatever the
/// payload claims.
pub fn parse_payload(frames: &[Vec<u8>], host_uuid: &str, host_name: &str) -> Result<DomainEvent> {
    let frame = frames
        .first()
        .ok_or_else(|| NetworkError::MalformedMessage("empty message".to_string()))?;
    let text = std::str::from_utf8(frame)
        .map_err(|e| NetworkError::MalformedMessage(format!("{:?}: {}", frame, e)))?;
    let value: Value = serde_json::from_str(text)
        .map_err(|_| NetworkError::MalformedMessage(format!("\"{}\"", text)))?;
    let mut map = match value {
        Value::Object(map) => map,
        other => return Err(NetworkError::MalformedMessage(other.to_string())),
    };
    if !map.contains_key("subject") || !map.contains_key("sensor_uuid") {
        return Err(NetworkError::MalformedMessage(Value::Object(map).to_string()));
    }

    let subject = map.get("subject").and_then(Value::as_str).map(str::to_string);
    match subject.as_deref() {
        Some(SUBJECT_ATTACH) => {
            Ok(DomainEvent::Attach(record_from_map(map, host_uuid, host_name)))
        }
        Some(SUBJECT_DETACH) => {
            Ok(DomainEvent::Detach(record_from_map(map, host_uuid, host_name)))
        }
        _ => {
            map.insert("host_uuid".to_string(), Value::from(host_uuid));
            map.insert("host_name".to_string(), Value::from(host_name));
            Ok(DomainEvent::Unknown { raw: map })
        }
    }
}

/// Builds a record from an already validated message.
///
/// Only `sensor_uuid` is required. A well-known key holding anything but a
/// string falls back to its default and stays in `attributes` untouched.
fn record_from_map(
    mut map: Map<String, Value>,
    host_uuid: &str,
    host_name: &str,
) -> SensorRecord {
    map.remove("subject");
    map.remove("host_uuid");
    map.remove("host_name");
    let sensor_uuid = match map.remove("sensor_uuid") {
        Some(Value::String(uuid)) => uuid,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let sensor_name = take_string(&mut map, "sensor_name").unwrap_or_default();
    let sensor_type = take_string(&mut map, "sensor_type").unwrap_or_else(default_sensor_type);
    SensorRecord {
        sensor_uuid,
        sensor_name,
        sensor_type,
        host_uuid: host_uuid.to_string(),
        host_name: host_name.to_string(),
        attributes: map,
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    if !map.get(key).map_or(false, Value::is_string) {
        return None;
    }
    match map.remove(key) {
        Some(Value::String(text)) => Some(text),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    Shout,
    Whisper,
    Join,
    Exit,
    Other(String),
}

impl RawEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            RawEventKind::Shout => "SHOUT",
            RawEventKind::Whisper => "WHISPER",
            RawEventKind::Join => "JOIN",
            RawEventKind::Exit => "EXIT",
            RawEventKind::Other(kind) => kind,
        }
    }
}

impl From<&str> for RawEventKind {
    fn from(kind: &str) -> Self {
        match kind.to_ascii_uppercase().as_str() {
            "SHOUT" => RawEventKind::Shout,
            "WHISPER" => RawEventKind::Whisper,
            "JOIN" => RawEventKind::Join,
            "EXIT" => RawEventKind::Exit,
            _ => RawEventKind::Other(kind.to_string()),
        }
    }
}

impl fmt::Display for RawEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event as handed over by the group-messaging transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub peer_uuid: Uuid,
    pub peer_name: String,
    /// Target group of a SHOUT, or the group a peer joined.
    pub group: Option<String>,
    pub frames: Vec<Vec<u8>>,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, peer_uuid: Uuid, peer_name: impl Into<String>) -> Self {
        Self {
            kind,
            peer_uuid,
            peer_name: peer_name.into(),
            group: None,
            frames: Vec::new(),
        }
    }

    pub fn shout(peer_uuid: Uuid, peer_name: &str, group: &str, payload: Vec<u8>) -> Self {
        Self {
            group: Some(group.to_string()),
            frames: vec![payload],
            ..Self::new(RawEventKind::Shout, peer_uuid, peer_name)
        }
    }

    pub fn whisper(peer_uuid: Uuid, peer_name: &str, payload: Vec<u8>) -> Self {
        Self {
            frames: vec![payload],
            ..Self::new(RawEventKind::Whisper, peer_uuid, peer_name)
        }
    }

    pub fn join(peer_uuid: Uuid, peer_name: &str, group: &str) -> Self {
        Self {
            group: Some(group.to_string()),
            ..Self::new(RawEventKind::Join, peer_uuid, peer_name)
        }
    }

    pub fn exit(peer_uuid: Uuid, peer_name: &str) -> Self {
        Self::new(RawEventKind::Exit, peer_uuid, peer_name)
    }

    /// Peer identity in the form stored as `host_uuid`.
    pub fn peer_hex(&self) -> String {
        self.peer_uuid.simple().to_string()
    }
}
