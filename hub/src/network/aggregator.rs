use super::node::GroupNode;
use super::Callback;
use crate::sensor::{SensorCallback, SensorHandle, SensorTypeMap};
use crate::transport::TransportFactory;
use common::{DataFormat, NetworkConfig, NetworkError, Result, SensorRecord};
use std::sync::Arc;

/// One [`GroupNode`] per configured wire format.
///
/// Nodes are kept in format order, which is also the order `sensor()` searches
/// them in. All nodes share one callback list.
pub struct Network {
    nodes: Vec<GroupNode>,
    callbacks: Vec<Callback>,
}

impl Network {
    pub fn new(
        config: &NetworkConfig,
        factory: Arc<dyn TransportFactory>,
        sensor_types: SensorTypeMap,
        callbacks: Vec<Callback>,
    ) -> Self {
        let nodes = config
            .resolved_formats()
            .into_iter()
            .map(|format| {
                GroupNode::new(
                    format,
                    config,
                    factory.clone(),
                    sensor_types.clone(),
                    callbacks.clone(),
                )
            })
            .collect();
        Self { nodes, callbacks }
    }

    /// Every supported format, descriptor sensors, no observers.
    pub fn with_defaults(factory: Arc<dyn TransportFactory>) -> Self {
        Self::new(
            &NetworkConfig::default(),
            factory,
            SensorTypeMap::descriptors(),
            Vec::new(),
        )
    }

    pub fn nodes(&self) -> &[GroupNode] {
        &self.nodes
    }

    pub fn node(&self, format: DataFormat) -> Option<&GroupNode> {
        self.nodes.iter().find(|node| node.format() == format)
    }

    pub fn callbacks(&self) -> &[Callback] {
        &self.callbacks
    }

    /// Replaces the observer list on the network and on every node.
    pub fn set_callbacks(&mut self, callbacks: Vec<Callback>) {
        for node in &mut self.nodes {
            node.set_callbacks(callbacks.clone());
        }
        self.callbacks = callbacks;
    }

    pub fn add_callback(&mut self, callback: Callback) {
        let mut callbacks = self.callbacks.clone();
        callbacks.push(callback);
        self.set_callbacks(callbacks);
    }

    pub fn has_events(&self) -> bool {
        self.nodes.iter().any(GroupNode::has_events)
    }

    pub fn running(&self) -> bool {
        self.nodes.iter().any(GroupNode::running)
    }

    /// Starts every node; the first failure is returned and nodes started
    /// before it keep running.
    pub fn start(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            node.start()?;
        }
        Ok(())
    }

    pub fn rejoin(&mut self) -> Result<()> {
        first_error(self.nodes.iter_mut().map(GroupNode::rejoin))
    }

    /// Stops every running node, returning the first failure.
    pub fn stop(&mut self) -> Result<()> {
        first_error(
            self.nodes
                .iter_mut()
                .filter(|node| node.running())
                .map(GroupNode::stop),
        )
    }

    /// Handles at most one pending event on each node.
    ///
    /// Returns how many nodes had an event to handle.
    pub fn poll(&mut self) -> Result<usize> {
        let mut handled = 0;
        for node in &mut self.nodes {
            if node.poll()?.is_some() {
                handled += 1;
            }
        }
        Ok(handled)
    }

    /// Known sensors across all nodes, in node order.
    pub fn sensors(&self) -> Vec<SensorRecord> {
        self.nodes.iter().flat_map(GroupNode::sensors).collect()
    }

    pub fn sensor(
        &self,
        sensor_uuid: &str,
        callbacks: Vec<SensorCallback>,
    ) -> Result<Box<dyn SensorHandle>> {
        self.nodes
            .iter()
            .find(|node| node.contains(sensor_uuid))
            .ok_or_else(|| NetworkError::NotFound(sensor_uuid.to_string()))?
            .sensor(sensor_uuid, callbacks)
    }
}

fn first_error(results: impl Iterator<Item = Result<()>>) -> Result<()> {
    results.fold(Ok(()), |acc, result| acc.and(result))
}
