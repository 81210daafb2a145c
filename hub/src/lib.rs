pub mod network;
pub mod sensor;
pub mod transport;

pub use network::{callback, Callback, GroupNode, Network, SensorRegistry};
pub use sensor::{SensorHandle, SensorTypeMap};
pub use transport::{MemoryBus, Transport, TransportFactory};
