// The IED data model: a depth-3 single-rooted tree of owned children.
// Built before the publisher starts, read-only afterwards; sharing happens
// through Arc<IedModel> handed to the server and client.

use crate::model::control_block::SampledValueControlBlock;

/// A logical node owning an ordered list of control blocks.
#[derive(Debug)]
pub struct LogicalNode {
    name: String,
    control_blocks: Vec<SampledValueControlBlock>,
}

impl LogicalNode {
    pub fn new(name: impl Into<String>) -> Self {
        LogicalNode {
            name: name.into(),
            control_blocks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append-only: blocks are never removed once added.
    pub fn add_control_block(&mut self, svcb: SampledValueControlBlock) {
        self.control_blocks.push(svcb);
    }

    pub fn control_blocks(&self) -> &[SampledValueControlBlock] {
        &self.control_blocks
    }

    pub fn control_block(&self, name: &str) -> Option<&SampledValueControlBlock> {
        self.control_blocks.iter().find(|svcb| svcb.name() == name)
    }
}

/// An intelligent electronic device: the model root owning its logical
/// nodes.
#[derive(Debug)]
pub struct IedModel {
    name: String,
    logical_nodes: Vec<LogicalNode>,
}

impl IedModel {
    pub fn new(name: impl Into<String>) -> Self {
        IedModel {
            name: name.into(),
            logical_nodes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_logical_node(&mut self, node: LogicalNode) {
        self.logical_nodes.push(node);
    }

    pub fn logical_nodes(&self) -> &[LogicalNode] {
        &self.logical_nodes
    }

    pub fn logical_node(&self, name: &str) -> Option<&LogicalNode> {
        self.logical_nodes.iter().find(|node| node.name() == name)
    }

    /// Finds the first control block published under the given APPID,
    /// used by subscribers to recover the wire data type.
    pub fn control_block_by_app_id(&self, app_id: u16) -> Option<&SampledValueControlBlock> {
        self.logical_nodes
            .iter()
            .flat_map(|node| node.control_blocks())
            .find(|svcb| svcb.app_id() == app_id)
    }
}
