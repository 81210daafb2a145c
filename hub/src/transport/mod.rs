//! Boundary with the group-messaging transport.
//!
//! Peer discovery, group membership and message delivery are provided by an
//! external library. The network core only needs the handful of calls below.

use common::{RawEvent, Result};
use uuid::Uuid;

pub mod memory;

pub use memory::{MemoryBus, MemorySession};

/// One session on the group-messaging transport.
pub trait Transport: Send {
    /// Stable identity of this session as seen by peers.
    fn uuid(&self) -> Uuid;

    /// Display name of this session as seen by peers.
    fn name(&self) -> String;

    /// Replaces any earlier value for `key`.
    fn set_header(&mut self, key: &str, value: &str) -> Result<()>;

    fn join(&mut self, group: &str) -> Result<()>;

    fn leave(&mut self, group: &str) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Must not block.
    fn has_pending_event(&self) -> bool;

    fn next_event(&mut self) -> Result<RawEvent>;
}

/// Hands out transport sessions.
pub trait TransportFactory: Send + Sync {
    fn acquire(&self, name: Option<&str>) -> Result<Box<dyn Transport>>;
}
