//! In-process group bus.
//!
//! Sessions handed out by a [`MemoryBus`] behave like peers on a shared
//! discovery network: shouts reach the sessions that joined the target group,
//! membership notices reach every started session. Used for trace replay and
//! for exercising the network core without sockets.

use super::{Transport, TransportFactory};
use common::{NetworkError, RawEvent, RawEventKind, Result};
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// Snapshot of one session's state on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub uuid: Uuid,
    pub name: String,
    pub started: bool,
    pub groups: BTreeSet<String>,
    pub headers: Vec<(String, String)>,
    pub pending: usize,
}

struct SessionSlot {
    info: SessionInfo,
    queue: VecDeque<RawEvent>,
}

struct BusState {
    available: bool,
    sessions: Vec<SessionSlot>,
}

#[derive(Clone)]
pub struct MemoryBus {
    inner: Arc<Mutex<BusState>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        MemoryBus {
            inner: Arc::new(Mutex::new(BusState {
                available: true,
                sessions: Vec::new(),
            })),
        }
    }

    /// When unavailable, `acquire` fails as if the transport could not be reached.
    pub fn set_available(&self, available: bool) {
        self.inner.lock().available = available;
    }

    /// Broadcasts `payload` to every started session joined to `group`.
    pub fn shout(&self, peer_uuid: Uuid, peer_name: &str, group: &str, payload: Vec<u8>) -> usize {
        self.deliver(RawEvent::shout(peer_uuid, peer_name, group, payload))
    }

    /// Sends `payload` to a single session.
    pub fn whisper(&self, peer_uuid: Uuid, peer_name: &str, to: Uuid, payload: Vec<u8>) -> bool {
        let event = RawEvent::whisper(peer_uuid, peer_name, payload);
        let mut state = self.inner.lock();
        match state
            .sessions
            .iter_mut()
            .find(|slot| slot.info.uuid == to && slot.info.started)
        {
            Some(slot) => {
                slot.queue.push_back(event);
                true
            }
            None => false,
        }
    }

    pub fn announce_join(&self, peer_uuid: Uuid, peer_name: &str, group: &str) -> usize {
        self.deliver(RawEvent::join(peer_uuid, peer_name, group))
    }

    pub fn announce_exit(&self, peer_uuid: Uuid, peer_name: &str) -> usize {
        self.deliver(RawEvent::exit(peer_uuid, peer_name))
    }

    /// Routes a prepared event and returns how many sessions received it.
    ///
    /// Shouts go to members of their group; every other kind goes to all
    /// started sessions. Sessions never receive their own events.
    pub fn deliver(&self, event: RawEvent) -> usize {
        let mut state = self.inner.lock();
        let mut delivered = 0;
        for slot in state.sessions.iter_mut() {
            if !slot.info.started || slot.info.uuid == event.peer_uuid {
                continue;
            }
            let wanted = match (&event.kind, &event.group) {
                (RawEventKind::Shout, Some(group)) => slot.info.groups.contains(group),
                (RawEventKind::Shout, None) => false,
                _ => true,
            };
            if wanted {
                slot.queue.push_back(event.clone());
                delivered += 1;
            }
        }
        delivered
    }

    /// Drops a session from the bus as if the transport lost it.
    pub fn disconnect(&self, id: Uuid) -> bool {
        let mut state = self.inner.lock();
        let before = state.sessions.len();
        state.sessions.retain(|slot| slot.info.uuid != id);
        state.sessions.len() != before
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.inner
            .lock()
            .sessions
            .iter()
            .map(|slot| SessionInfo {
                pending: slot.queue.len(),
                ..slot.info.clone()
            })
            .collect()
    }

    fn with_slot<T>(&self, id: Uuid, f: impl FnOnce(&mut SessionSlot) -> T) -> Result<T> {
        let mut state = self.inner.lock();
        state
            .sessions
            .iter_mut()
            .find(|slot| slot.info.uuid == id)
            .map(f)
            .ok_or_else(|| NetworkError::Transport(format!("session {} is closed", id)))
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for MemoryBus {
    fn acquire(&self, name: Option<&str>) -> Result<Box<dyn Transport>> {
        let mut state = self.inner.lock();
        if !state.available {
            return Err(NetworkError::Transport("memory bus is unavailable".to_string()));
        }
        let uuid = Uuid::new_v4();
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| uuid.simple().to_string()[..6].to_string());
        state.sessions.push(SessionSlot {
            info: SessionInfo {
                uuid,
                name: name.clone(),
                started: false,
                groups: BTreeSet::new(),
                headers: Vec::new(),
                pending: 0,
            },
            queue: VecDeque::new(),
        });
        Ok(Box::new(MemorySession {
            uuid,
            name,
            bus: self.clone(),
        }))
    }
}

pub struct MemorySession {
    uuid: Uuid,
    name: String,
    bus: MemoryBus,
}

impl Transport for MemorySession {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_header(&mut self, key: &str, value: &str) -> Result<()> {
        self.bus.with_slot(self.uuid, |slot| {
            slot.info.headers.retain(|(k, _)| k != key);
            slot.info.headers.push((key.to_string(), value.to_string()));
        })
    }

    fn join(&mut self, group: &str) -> Result<()> {
        self.bus.with_slot(self.uuid, |slot| {
            slot.info.groups.insert(group.to_string());
        })
    }

    fn leave(&mut self, group: &str) -> Result<()> {
        self.bus.with_slot(self.uuid, |slot| {
            slot.info.groups.remove(group);
        })
    }

    fn start(&mut self) -> Result<()> {
        self.bus.with_slot(self.uuid, |slot| slot.info.started = true)
    }

    fn stop(&mut self) -> Result<()> {
        self.bus.with_slot(self.uuid, |slot| {
            slot.info.started = false;
            slot.queue.clear();
        })
    }

    fn has_pending_event(&self) -> bool {
        self.bus
            .with_slot(self.uuid, |slot| !slot.queue.is_empty())
            .unwrap_or(false)
    }

    fn next_event(&mut self) -> Result<RawEvent> {
        self.bus
            .with_slot(self.uuid, |slot| slot.queue.pop_front())?
            .ok_or_else(|| NetworkError::Transport("no pending event".to_string()))
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let mut state = self.bus.inner.lock();
        state.sessions.retain(|slot| slot.info.uuid != self.uuid);
    }
}
