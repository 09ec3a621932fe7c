//! Patch Graph
//!
//! The reference host: owns module instances, routes signals between them
//! along cables, and calls every module once per sample in dependency order.
//! Inputs without a cable are left out of the module's [`PortValues`], which
//! is how modules tell an unpatched input from one patched to 0V.

use crate::port::{GraphModule, ParamId, PortId, PortSpec, PortValues};
use slotmap::{new_key_type, DefaultKey, SlotMap};
use std::collections::{HashMap, VecDeque};

/// Unique identifier for a node in the patch graph
pub type NodeId = DefaultKey;

new_key_type! {
    /// Unique identifier for a cable connection
    pub struct CableId;
}

/// Reference to a specific port on a specific node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: PortId,
}

/// A cable connecting two ports
#[derive(Debug, Clone)]
pub struct Cable {
    pub from: PortRef,
    pub to: PortRef,
}

struct Node {
    module: Box<dyn GraphModule>,
    name: String,
}

/// Error types for patch operations
#[derive(Debug, Clone, PartialEq)]
pub enum PatchError {
    InvalidNode,
    InvalidPort,
    InvalidCable,
    CycleDetected { nodes: Vec<NodeId> },
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchError::InvalidNode => write!(f, "Invalid node"),
            PatchError::InvalidPort => write!(f, "Invalid port"),
            PatchError::InvalidCable => write!(f, "Invalid cable"),
            PatchError::CycleDetected { nodes } => {
                write!(f, "Cycle detected involving {} nodes", nodes.len())
            }
        }
    }
}

impl std::error::Error for PatchError {}

/// Handle to a node for ergonomic port references
#[derive(Clone)]
pub struct NodeHandle {
    id: NodeId,
    spec: PortSpec,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Reference an output port by name
    pub fn out(&self, name: &str) -> Result<PortRef, PatchError> {
        let port = self
            .spec
            .output_by_name(name)
            .ok_or(PatchError::InvalidPort)?;
        Ok(PortRef {
            node: self.id,
            port: port.id,
        })
    }

    /// Reference an input port by name
    pub fn in_(&self, name: &str) -> Result<PortRef, PatchError> {
        let port = self
            .spec
            .input_by_name(name)
            .ok_or(PatchError::InvalidPort)?;
        Ok(PortRef {
            node: self.id,
            port: port.id,
        })
    }

    pub fn spec(&self) -> &PortSpec {
        &self.spec
    }
}

/// The patch graph containing modules and connections
pub struct Patch {
    nodes: SlotMap<NodeId, Node>,
    cables: SlotMap<CableId, Cable>,

    // Execution state
    execution_order: Vec<NodeId>,
    buffers: HashMap<PortRef, f64>,

    sample_rate: f64,
}

impl Patch {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            nodes: SlotMap::new(),
            cables: SlotMap::with_key(),
            execution_order: Vec::new(),
            buffers: HashMap::new(),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Seconds per tick
    pub fn sample_time(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Change the sample rate of the patch and every module in it
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        for (_, node) in &mut self.nodes {
            node.module.set_sample_rate(sample_rate);
        }
    }

    /// Add a module to the patch
    pub fn add<M: GraphModule + 'static>(&mut self, name: impl Into<String>, module: M) -> NodeHandle {
        self.add_boxed(name, Box::new(module))
    }

    /// Add a boxed module to the patch
    pub fn add_boxed(&mut self, name: impl Into<String>, mut module: Box<dyn GraphModule>) -> NodeHandle {
        module.set_sample_rate(self.sample_rate);
        let spec = module.port_spec().clone();
        let id = self.nodes.insert(Node {
            module,
            name: name.into(),
        });
        self.invalidate();
        NodeHandle { id, spec }
    }

    /// Remove a module from the patch, dropping it
    pub fn remove(&mut self, node: NodeId) -> Result<(), PatchError> {
        if self.nodes.remove(node).is_none() {
            return Err(PatchError::InvalidNode);
        }

        self.cables
            .retain(|_, cable| cable.from.node != node && cable.to.node != node);
        self.buffers.retain(|port, _| port.node != node);

        self.invalidate();
        Ok(())
    }

    /// Connect an output port to an input port
    pub fn connect(&mut self, from: PortRef, to: PortRef) -> Result<CableId, PatchError> {
        self.validate_output_port(from)?;
        self.validate_input_port(to)?;

        let id = self.cables.insert(Cable { from, to });
        self.invalidate();
        Ok(id)
    }

    /// Disconnect a cable by ID
    pub fn disconnect(&mut self, cable_id: CableId) -> Result<(), PatchError> {
        self.cables
            .remove(cable_id)
            .ok_or(PatchError::InvalidCable)?;
        self.invalidate();
        Ok(())
    }

    /// Set a parameter on a module
    pub fn set_param(&mut self, node: NodeId, param: ParamId, value: f64) -> Result<(), PatchError> {
        let n = self.nodes.get_mut(node).ok_or(PatchError::InvalidNode)?;
        n.module.set_param(param, value);
        Ok(())
    }

    /// Get a parameter value from a module
    pub fn get_param(&self, node: NodeId, param: ParamId) -> Option<f64> {
        self.nodes.get(node).and_then(|n| n.module.get_param(param))
    }

    pub fn get_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node).map(|n| n.name.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }

    pub fn cables(&self) -> impl Iterator<Item = (CableId, &Cable)> {
        self.cables.iter()
    }

    /// Execution order (after compile)
    pub fn execution_order(&self) -> &[NodeId] {
        &self.execution_order
    }

    pub fn is_compiled(&self) -> bool {
        !self.execution_order.is_empty() || self.nodes.is_empty()
    }

    fn invalidate(&mut self) {
        self.execution_order.clear();
    }

    fn validate_output_port(&self, port_ref: PortRef) -> Result<(), PatchError> {
        let node = self.nodes.get(port_ref.node).ok_or(PatchError::InvalidNode)?;
        node.module
            .port_spec()
            .output_by_id(port_ref.port)
            .ok_or(PatchError::InvalidPort)?;
        Ok(())
    }

    fn validate_input_port(&self, port_ref: PortRef) -> Result<(), PatchError> {
        let node = self.nodes.get(port_ref.node).ok_or(PatchError::InvalidNode)?;
        node.module
            .port_spec()
            .input_by_id(port_ref.port)
            .ok_or(PatchError::InvalidPort)?;
        Ok(())
    }

    /// Compile the patch into an executable order
    pub fn compile(&mut self) -> Result<(), PatchError> {
        let order = self.topological_sort()?;
        self.execution_order = order;

        // Pre-allocate output buffers
        for (id, node) in &self.nodes {
            for output in &node.module.port_spec().outputs {
                self.buffers
                    .entry(PortRef {
                        node: id,
                        port: output.id,
                    })
                    .or_insert(0.0);
            }
        }

        Ok(())
    }

    fn topological_sort(&self) -> Result<Vec<NodeId>, PatchError> {
        let mut in_degree: HashMap<NodeId, usize> = self.nodes.keys().map(|k| (k, 0)).collect();
        let mut successors: HashMap<NodeId, Vec<NodeId>> =
            self.nodes.keys().map(|k| (k, vec![])).collect();

        for cable in self.cables.values() {
            *in_degree.entry(cable.to.node).or_insert(0) += 1;
            successors
                .entry(cable.from.node)
                .or_default()
                .push(cable.to.node);
        }

        // Kahn's algorithm
        let mut queue: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            result.push(node);
            let Some(next) = successors.get(&node) else {
                continue;
            };
            for &succ in next {
                if let Some(deg) = in_degree.get_mut(&succ) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(succ);
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            let in_cycle: Vec<NodeId> = in_degree
                .into_iter()
                .filter(|(_, deg)| *deg > 0)
                .map(|(id, _)| id)
                .collect();
            return Err(PatchError::CycleDetected { nodes: in_cycle });
        }

        Ok(result)
    }

    /// Process a single sample
    ///
    /// Compiles first if the topology changed since the last tick.
    pub fn tick(&mut self) -> Result<(), PatchError> {
        if !self.is_compiled() {
            self.compile()?;
        }

        let mut outputs = PortValues::new();
        for i in 0..self.execution_order.len() {
            let node_id = self.execution_order[i];
            let inputs = self.gather_inputs(node_id);
            outputs.clear();

            if let Some(node) = self.nodes.get_mut(node_id) {
                node.module.tick(&inputs, &mut outputs);
            }

            self.scatter_outputs(node_id, &outputs);
        }

        Ok(())
    }

    /// Last value written to an output port
    pub fn output(&self, port: PortRef) -> Option<f64> {
        self.buffers.get(&port).copied()
    }

    fn gather_inputs(&self, node_id: NodeId) -> PortValues {
        let mut values = PortValues::new();

        // Sum all incoming cables (hardware-style input mixing)
        for cable in self.cables.values().filter(|c| c.to.node == node_id) {
            let value = self.buffers.get(&cable.from).copied().unwrap_or(0.0);
            values.accumulate(cable.to.port, value);
        }

        values
    }

    fn scatter_outputs(&mut self, node_id: NodeId, outputs: &PortValues) {
        for (&port_id, &value) in &outputs.values {
            let port_ref = PortRef {
                node: node_id,
                port: port_id,
            };
            self.buffers.insert(port_ref, value);
        }
    }

    /// Reset all modules in the patch
    pub fn reset(&mut self) {
        for (_, node) in &mut self.nodes {
            node.module.reset();
        }
        for value in self.buffers.values_mut() {
            *value = 0.0;
        }
    }

    /// Iterate over all nodes
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &str, &dyn GraphModule)> {
        self.nodes
            .iter()
            .map(|(id, node)| (id, node.name.as_str(), node.module.as_ref()))
    }
}
