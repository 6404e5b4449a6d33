//! Gene types for sprout genomes.
//!
//! This module defines the fundamental building blocks of a genome:
//! - [`NodeGene`]: a value slot that aggregates incoming contributions
//! - [`ConnectionGene`]: a weighted, operator-tagged link between two node positions
//!
//! Equality on genes is structural: identifiers are carried for traceability
//! in snapshots and never take part in comparisons.

use std::fmt;

use uuid::Uuid;

/// Opaque identifier attached to every gene.
///
/// Fresh identifiers are random UUIDs, so collisions across lineages are
/// effectively impossible. Identifiers loaded from a snapshot round-trip verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneId(String);

impl GeneId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing identifier string.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role of a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Receives one slot of the sensor vector, selected by `io_index`.
    Input,
    /// Produces one slot of the actuator vector, in declaration order.
    Output,
    /// Internal node added by insert-node mutation.
    Hidden,
}

impl NodeKind {
    /// All kinds, indexed by their record code.
    pub const ALL: [Self; 3] = [Self::Input, Self::Output, Self::Hidden];

    /// Integer code used in genome records.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Input => 0,
            Self::Output => 1,
            Self::Hidden => 2,
        }
    }

    /// Inverse of [`code`](Self::code).
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Whether a connection may start at a node of this kind.
    #[must_use]
    pub const fn is_source(self) -> bool {
        matches!(self, Self::Input | Self::Hidden)
    }

    /// Whether a connection may end at a node of this kind.
    #[must_use]
    pub const fn is_target(self) -> bool {
        matches!(self, Self::Hidden | Self::Output)
    }
}

/// Binary operator used both by connections (to apply their weight) and by
/// nodes (to fold incoming contributions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    #[default]
    Sum,
    Product,
}

impl Operator {
    /// All operators, indexed by their record code.
    pub const ALL: [Self; 2] = [Self::Sum, Self::Product];

    /// Integer code used in genome records.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Sum => 0,
            Self::Product => 1,
        }
    }

    /// Inverse of [`code`](Self::code).
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Combine a source value with a connection weight.
    #[inline]
    #[must_use]
    pub fn combine(self, source: f32, weight: f32) -> f32 {
        match self {
            Self::Sum => source + weight,
            Self::Product => source * weight,
        }
    }

    /// Fold an incoming contribution into a node accumulator.
    ///
    /// Product treats a zero accumulator as an empty slot and assigns the
    /// contribution instead of multiplying. A later contribution of exactly
    /// zero still annihilates the product.
    #[inline]
    #[must_use]
    pub fn fold(self, accumulator: f32, value: f32) -> f32 {
        match self {
            Self::Sum => accumulator + value,
            Self::Product => {
                if accumulator == 0.0 {
                    value
                } else {
                    accumulator * value
                }
            }
        }
    }
}

/// A node gene.
///
/// Nodes live in an append-only sequence inside a [`Genome`](crate::Genome);
/// their position in that sequence is the handle connections refer to.
#[derive(Debug, Clone)]
pub struct NodeGene {
    /// Traceability identifier, ignored by equality.
    pub id: GeneId,
    pub kind: NodeKind,
    /// Sensor slot feeding this node. Only meaningful for input nodes.
    pub io_index: usize,
    /// How incoming contributions combine at this node.
    pub aggregation: Operator,
}

impl NodeGene {
    /// Create an input node reading sensor slot `io_index`.
    #[must_use]
    pub fn input(io_index: usize) -> Self {
        Self {
            id: GeneId::fresh(),
            kind: NodeKind::Input,
            io_index,
            aggregation: Operator::Sum,
        }
    }

    /// Create an output node.
    #[must_use]
    pub fn output() -> Self {
        Self {
            id: GeneId::fresh(),
            kind: NodeKind::Output,
            io_index: 0,
            aggregation: Operator::Sum,
        }
    }

    /// Create a hidden node.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            id: GeneId::fresh(),
            kind: NodeKind::Hidden,
            io_index: 0,
            aggregation: Operator::Sum,
        }
    }

    #[must_use]
    pub fn with_aggregation(mut self, aggregation: Operator) -> Self {
        self.aggregation = aggregation;
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: GeneId) -> Self {
        self.id = id;
        self
    }
}

impl PartialEq for NodeGene {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.io_index == other.io_index
            && self.aggregation == other.aggregation
    }
}

/// A connection gene linking two node positions of the owning genome.
///
/// Disabled connections are skipped during evaluation but kept for lineage.
#[derive(Debug, Clone)]
pub struct ConnectionGene {
    /// Traceability identifier, ignored by equality.
    pub id: GeneId,
    /// Position of the source node in the genome's node sequence.
    pub source: usize,
    /// Position of the target node in the genome's node sequence.
    pub target: usize,
    pub weight: f32,
    /// How the source value and the weight combine.
    pub weight_operator: Operator,
    pub enabled: bool,
}

impl ConnectionGene {
    /// Create a new enabled connection with a fresh identifier.
    #[must_use]
    pub fn new(source: usize, target: usize, weight: f32, weight_operator: Operator) -> Self {
        Self {
            id: GeneId::fresh(),
            source,
            target,
            weight,
            weight_operator,
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: GeneId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Key used for multiset comparison of connections.
    pub(crate) fn structural_key(&self) -> (usize, usize, u32, u8, bool) {
        (
            self.source,
            self.target,
            self.weight.to_bits(),
            self.weight_operator.code(),
            self.enabled,
        )
    }
}

impl PartialEq for ConnectionGene {
    fn eq(&self, other: &Self) -> bool {
        self.structural_key() == other.structural_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_gene_creation() {
        let input = NodeGene::input(3);
        assert_eq!(input.kind, NodeKind::Input);
        assert_eq!(input.io_index, 3);
        assert_eq!(input.aggregation, Operator::Sum);

        let output = NodeGene::output().with_aggregation(Operator::Product);
        assert_eq!(output.kind, NodeKind::Output);
        assert_eq!(output.aggregation, Operator::Product);

        let hidden = NodeGene::hidden();
        assert_eq!(hidden.kind, NodeKind::Hidden);
    }

    #[test]
    fn test_fresh_ids_are_distinct() {
        let a = NodeGene::hidden();
        let b = NodeGene::hidden();
        assert_ne!(a.id, b.id);
        // Structural equality ignores the identifier.
        assert_eq!(a, b);
    }

    #[test]
    fn test_connection_gene_creation() {
        let conn = ConnectionGene::new(0, 2, 0.5, Operator::Product);
        assert_eq!(conn.source, 0);
        assert_eq!(conn.target, 2);
        assert!((conn.weight - 0.5).abs() < 1e-6);
        assert!(conn.enabled);
        assert!(!conn.clone().disabled().enabled);
    }

    #[test]
    fn test_connection_equality_ignores_id() {
        let a = ConnectionGene::new(0, 1, 1.5, Operator::Sum);
        let b = ConnectionGene::new(0, 1, 1.5, Operator::Sum);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().disabled());
        assert_ne!(a, ConnectionGene::new(0, 1, 1.5, Operator::Product));
    }

    #[test]
    fn test_operator_combine() {
        assert!((Operator::Sum.combine(2.0, 3.0) - 5.0).abs() < 1e-6);
        assert!((Operator::Product.combine(2.0, 3.0) - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_product_fold_first_contribution_assigns() {
        assert!((Operator::Product.fold(0.0, 4.0) - 4.0).abs() < 1e-6);
        assert!((Operator::Product.fold(4.0, 0.5) - 2.0).abs() < 1e-6);
        // A later zero still annihilates.
        assert_eq!(Operator::Product.fold(4.0, 0.0), 0.0);
        assert!((Operator::Sum.fold(1.0, 2.0) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_codes() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_code(i64::from(kind.code())), Some(kind));
        }
        for op in Operator::ALL {
            assert_eq!(Operator::from_code(i64::from(op.code())), Some(op));
        }
        assert_eq!(NodeKind::from_code(3), None);
        assert_eq!(NodeKind::from_code(-1), None);
        assert_eq!(Operator::from_code(2), None);
    }

    #[test]
    fn test_source_target_roles() {
        assert!(NodeKind::Input.is_source());
        assert!(!NodeKind::Input.is_target());
        assert!(NodeKind::Hidden.is_source() && NodeKind::Hidden.is_target());
        assert!(!NodeKind::Output.is_source());
        assert!(NodeKind::Output.is_target());
    }
}
