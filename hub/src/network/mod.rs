//! Sensor discovery on top of a group-messaging transport.
//!
//! A [`GroupNode`] listens on the discovery group of one wire format and keeps
//! its own [`SensorRegistry`]. A [`Network`] runs one node per format. Nothing
//! here blocks or spawns: callers drive everything through `poll()`.

use common::{DataFormat, DomainEvent, Result};
use std::sync::Arc;

mod aggregator;
mod interpreter;
mod node;
mod registry;
mod version;

pub use aggregator::Network;
pub use interpreter::{DropReason, EventInterpreter, Outcome};
pub use node::GroupNode;
pub use registry::SensorRegistry;
pub use version::{VersionGate, VersionSkew};

/// Observer of attach/detach notifications.
///
/// Errors are not caught; they abort the current `poll()` and reach its caller.
pub type Callback = Arc<dyn Fn(DataFormat, &DomainEvent) -> Result<()> + Send + Sync>;

pub fn callback<F>(f: F) -> Callback
where
    F: Fn(DataFormat, &DomainEvent) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}
