//! Mutation operators.
//!
//! Every operator takes a parent genome by reference and returns a list of
//! children, each a copy of the parent with one change layered on top. The
//! parent is never modified.
//!
//! - [`connection_mutations`]: one new connection per candidate pair, in a Sum
//!   and a Product flavour
//! - [`insert_node_mutations`]: split each connection through a new hidden node
//! - [`connection_weight_random_add`]: perturb every weight, topology frozen

use rand::Rng;

use crate::gene::{ConnectionGene, NodeGene, Operator};
use crate::genome::Genome;

/// A `(source, target)` node position pair not yet connected in a genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionPair {
    pub source: usize,
    pub target: usize,
}

/// First-half settings for a split connection: an active pass-through and a
/// dormant one.
const SPLIT_VARIANTS: [(f32, Operator); 2] = [(1.0, Operator::Product), (0.0, Operator::Sum)];

/// Draw uniformly from `[low, high)`. A degenerate range yields `low`.
fn draw<R: Rng>(rng: &mut R, low: f32, high: f32) -> f32 {
    if low < high {
        rng.random_range(low..high)
    } else {
        low
    }
}

/// Enumerate every connection that could be added to `genome`.
///
/// Sources are input and hidden nodes, targets are hidden and output nodes.
/// Self loops and pairs already present (enabled or disabled) are excluded.
/// Pairs come out with sources in node order on the outer loop.
#[must_use]
pub fn candidate_pairs(genome: &Genome) -> Vec<ConnectionPair> {
    let nodes = genome.nodes();
    let mut pairs = Vec::new();
    for (source, src) in nodes.iter().enumerate() {
        if !src.kind.is_source() {
            continue;
        }
        for (target, dst) in nodes.iter().enumerate() {
            if !dst.kind.is_target() || source == target {
                continue;
            }
            if genome.contains_connection(source, target) {
                continue;
            }
            pairs.push(ConnectionPair { source, target });
        }
    }
    pairs
}

/// Add-connection mutation.
///
/// For every candidate pair one weight is drawn from `[weight_min, weight_max)`
/// and two children are emitted: one with a Sum connection, one with a Product
/// connection. Returns `2 * candidate_pairs(genome).len()` genomes, or an empty
/// list when the genome is already fully connected.
pub fn connection_mutations<R: Rng>(
    genome: &Genome,
    weight_min: f32,
    weight_max: f32,
    rng: &mut R,
) -> Vec<Genome> {
    let pairs = candidate_pairs(genome);
    let mut children = Vec::with_capacity(pairs.len() * 2);
    for pair in pairs {
        let weight = draw(rng, weight_min, weight_max);
        for op in Operator::ALL {
            let mut child = genome.clone();
            child.push_connection_unchecked(ConnectionGene::new(
                pair.source,
                pair.target,
                weight,
                op,
            ));
            children.push(child);
        }
    }
    children
}

/// Insert-node mutation.
///
/// For every connection (enabled or not) two children are emitted. In each the
/// connection is disabled, a hidden Sum node is appended, and two connections
/// are appended: `source -> hidden` (weight 1 with Product, or weight 0 with
/// Sum) and `hidden -> target` carrying the original weight and operator.
/// Returns `2 * genome.connections().len()` genomes.
#[must_use]
pub fn insert_node_mutations(genome: &Genome) -> Vec<Genome> {
    let mut children = Vec::with_capacity(genome.connections().len() * 2);
    for (i, conn) in genome.connections().iter().enumerate() {
        for (weight, op) in SPLIT_VARIANTS {
            let mut child = genome.clone();
            child.connections_mut()[i].enabled = false;
            let hidden = child.push_node(NodeGene::hidden());
            child.push_connection_unchecked(ConnectionGene::new(conn.source, hidden, weight, op));
            child.push_connection_unchecked(ConnectionGene::new(
                hidden,
                conn.target,
                conn.weight,
                conn.weight_operator,
            ));
            children.push(child);
        }
    }
    children
}

/// Weight-perturbation mutation.
///
/// Returns exactly `count` clones of `genome`. In each clone every connection
/// weight is shifted by an independent draw from `[delta_min, delta_max)`.
/// Topology is untouched, and the clones share the parent's node arena.
pub fn connection_weight_random_add<R: Rng>(
    genome: &Genome,
    count: usize,
    delta_min: f32,
    delta_max: f32,
    rng: &mut R,
) -> Vec<Genome> {
    (0..count)
        .map(|_| {
            let mut child = genome.clone();
            for conn in child.connections_mut() {
                conn.weight += draw(rng, delta_min, delta_max);
            }
            child
        })
        .collect()
}

/// Both structural operators concatenated: add-connection children first,
/// then insert-node children.
pub fn structural_mutations<R: Rng>(
    genome: &Genome,
    weight_min: f32,
    weight_max: f32,
    rng: &mut R,
) -> Vec<Genome> {
    let mut children = connection_mutations(genome, weight_min, weight_max, rng);
    children.extend(insert_node_mutations(genome));
    children
}
