//! Genome container with an append-only node arena.
//!
//! A [`Genome`] is an ordered node sequence plus a connection list. Connections
//! address nodes by position, so the node sequence may only ever grow: there is
//! no API to reorder or remove nodes.
//!
//! The node arena sits behind an [`Arc`]. Clones that leave topology untouched
//! (weight perturbation) share it; appending a node copies it on write.

use std::sync::Arc;

use thiserror::Error;

use crate::gene::{ConnectionGene, NodeGene, NodeKind};

/// Errors raised when assembling a genome from parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenomeError {
    /// A connection refers to a node position that does not exist.
    #[error("connection {connection} refers to node {node}, but the genome has {len} nodes")]
    DanglingConnection {
        connection: usize,
        node: usize,
        len: usize,
    },
}

/// An evolvable feed-forward computation graph.
///
/// Equality is structural: same node sequence (kind, io_index, aggregation)
/// and same connection multiset. Gene identifiers are ignored.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    nodes: Arc<Vec<NodeGene>>,
    connections: Vec<ConnectionGene>,
}

impl Genome {
    /// Assemble a genome, checking that every connection endpoint is a valid
    /// node position.
    ///
    /// # Errors
    ///
    /// Returns [`GenomeError::DanglingConnection`] on the first connection
    /// whose source or target is out of range.
    pub fn new(nodes: Vec<NodeGene>, connections: Vec<ConnectionGene>) -> Result<Self, GenomeError> {
        let len = nodes.len();
        for (i, conn) in connections.iter().enumerate() {
            for node in [conn.source, conn.target] {
                if node >= len {
                    return Err(GenomeError::DanglingConnection {
                        connection: i,
                        node,
                        len,
                    });
                }
            }
        }
        Ok(Self {
            nodes: Arc::new(nodes),
            connections,
        })
    }

    /// Create a hand-authored seed: `num_inputs` input nodes reading sensor
    /// slots `0..num_inputs`, followed by `num_outputs` output nodes, and no
    /// connections.
    #[must_use]
    pub fn seed(num_inputs: usize, num_outputs: usize) -> Self {
        let mut nodes = Vec::with_capacity(num_inputs + num_outputs);
        nodes.extend((0..num_inputs).map(NodeGene::input));
        nodes.extend((0..num_outputs).map(|_| NodeGene::output()));
        Self {
            nodes: Arc::new(nodes),
            connections: Vec::new(),
        }
    }

    /// The node sequence. Positions in this slice are node handles.
    #[must_use]
    pub fn nodes(&self) -> &[NodeGene] {
        &self.nodes
    }

    /// Connections in declaration order.
    #[must_use]
    pub fn connections(&self) -> &[ConnectionGene] {
        &self.connections
    }

    /// Mutable access to connections. Endpoints must stay in range.
    pub(crate) fn connections_mut(&mut self) -> &mut [ConnectionGene] {
        &mut self.connections
    }

    /// Append a node and return its position.
    pub fn push_node(&mut self, node: NodeGene) -> usize {
        let nodes = Arc::make_mut(&mut self.nodes);
        nodes.push(node);
        nodes.len() - 1
    }

    /// Append a connection and return its position.
    ///
    /// # Errors
    ///
    /// Returns [`GenomeError::DanglingConnection`] if either endpoint is not a
    /// node position.
    pub fn push_connection(&mut self, connection: ConnectionGene) -> Result<usize, GenomeError> {
        let len = self.nodes.len();
        let position = self.connections.len();
        for node in [connection.source, connection.target] {
            if node >= len {
                return Err(GenomeError::DanglingConnection {
                    connection: position,
                    node,
                    len,
                });
            }
        }
        self.connections.push(connection);
        Ok(position)
    }

    /// Append a connection whose endpoints the caller already knows are valid.
    pub(crate) fn push_connection_unchecked(&mut self, connection: ConnectionGene) {
        debug_assert!(connection.source < self.nodes.len());
        debug_assert!(connection.target < self.nodes.len());
        self.connections.push(connection);
    }

    fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }

    /// Number of input nodes; the required sensor vector length.
    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.count_kind(NodeKind::Input)
    }

    /// Number of output nodes; the produced actuator vector length.
    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.count_kind(NodeKind::Output)
    }

    #[must_use]
    pub fn num_hidden(&self) -> usize {
        self.count_kind(NodeKind::Hidden)
    }

    #[must_use]
    pub fn num_enabled_connections(&self) -> usize {
        self.connections.iter().filter(|c| c.enabled).count()
    }

    /// Whether a connection from `source` to `target` exists, enabled or not.
    #[must_use]
    pub fn contains_connection(&self, source: usize, target: usize) -> bool {
        self.connections
            .iter()
            .any(|c| c.source == source && c.target == target)
    }

    /// Whether two genomes share the same node arena allocation.
    #[must_use]
    pub fn shares_nodes_with(&self, other: &Genome) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
    }
}

impl PartialEq for Genome {
    fn eq(&self, other: &Self) -> bool {
        if self.nodes != other.nodes || self.connections.len() != other.connections.len() {
            return false;
        }
        let mut ours: Vec<_> = self.connections.iter().map(ConnectionGene::structural_key).collect();
        let mut theirs: Vec<_> = other
            .connections
            .iter()
            .map(ConnectionGene::structural_key)
            .collect();
        ours.sort_unstable();
        theirs.sort_unstable();
        ours == theirs
    }
}
