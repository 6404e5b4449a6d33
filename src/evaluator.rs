//! Feed-forward evaluator for sprout genomes.
//!
//! Evaluation walks the connection list in declaration order. There is no
//! topological sort: a connection reads whatever its source accumulator holds
//! at the moment it is processed. Cyclic or out-of-order genomes therefore
//! produce order-dependent results, which the evaluator accepts as-is.

use thiserror::Error;

use crate::gene::NodeKind;
use crate::genome::Genome;

/// Errors raised by evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluatorError {
    /// The sensor vector length does not match the genome's input node count.
    #[error("input length mismatch: expected {expected}, got {actual}")]
    InputArity { expected: usize, actual: usize },
    /// An input node selects a sensor slot that does not exist.
    #[error("input node reads sensor slot {io_index}, but only {len} were supplied")]
    InputIndex { io_index: usize, len: usize },
}

/// Evaluate `genome` on `inputs` and return the output vector.
///
/// The result has one entry per output node, in node-sequence order.
///
/// # Errors
///
/// Returns [`EvaluatorError::InputArity`] if `inputs.len()` differs from the
/// number of input nodes, and [`EvaluatorError::InputIndex`] if an input
/// node's `io_index` is out of range.
pub fn evaluate(genome: &Genome, inputs: &[f32]) -> Result<Vec<f32>, EvaluatorError> {
    FeedForward::default().evaluate(genome, inputs)
}

/// Reusable accumulator buffer for repeated evaluation.
///
/// Holds no state between calls beyond allocated capacity, so results are
/// identical to [`evaluate`].
#[derive(Debug, Clone, Default)]
pub struct FeedForward {
    accumulators: Vec<f32>,
}

impl FeedForward {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate and return a freshly allocated output vector.
    ///
    /// # Errors
    ///
    /// See [`evaluate`].
    pub fn evaluate(&mut self, genome: &Genome, inputs: &[f32]) -> Result<Vec<f32>, EvaluatorError> {
        let mut outputs = Vec::with_capacity(genome.num_outputs());
        self.evaluate_into(genome, inputs, &mut outputs)?;
        Ok(outputs)
    }

    /// Evaluate, replacing the contents of `outputs` with the result.
    ///
    /// # Errors
    ///
    /// See [`evaluate`]. `outputs` is left empty on error.
    pub fn evaluate_into(
        &mut self,
        genome: &Genome,
        inputs: &[f32],
        outputs: &mut Vec<f32>,
    ) -> Result<(), EvaluatorError> {
        outputs.clear();

        let expected = genome.num_inputs();
        if inputs.len() != expected {
            return Err(EvaluatorError::InputArity {
                expected,
                actual: inputs.len(),
            });
        }

        let nodes = genome.nodes();
        self.accumulators.clear();
        self.accumulators.reserve(nodes.len());
        for node in nodes {
            let seed = match node.kind {
                NodeKind::Input => *inputs.get(node.io_index).ok_or(EvaluatorError::InputIndex {
                    io_index: node.io_index,
                    len: inputs.len(),
                })?,
                NodeKind::Output | NodeKind::Hidden => 0.0,
            };
            self.accumulators.push(seed);
        }

        for conn in genome.connections().iter().filter(|c| c.enabled) {
            let value = conn
                .weight_operator
                .combine(self.accumulators[conn.source], conn.weight);
            let target = &mut self.accumulators[conn.target];
            *target = nodes[conn.target].aggregation.fold(*target, value);
        }

        outputs.extend(
            nodes
                .iter()
                .zip(&self.accumulators)
                .filter(|(node, _)| node.kind == NodeKind::Output)
                .map(|(_, &value)| value),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::{ConnectionGene, NodeGene, Operator};

    fn two_input_genome(ops: [(f32, Operator); 2], aggregation: Operator) -> Genome {
        Genome::new(
            vec![
                NodeGene::input(0),
                NodeGene::input(1),
                NodeGene::output().with_aggregation(aggregation),
            ],
            vec![
                ConnectionGene::new(0, 2, ops[0].0, ops[0].1),
                ConnectionGene::new(1, 2, ops[1].0, ops[1].1),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_seed_outputs_zero() {
        let genome = Genome::seed(2, 3);
        let outputs = evaluate(&genome, &[1.0, -1.0]).unwrap();
        assert_eq!(outputs, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sum_weights_and_sum_aggregation() {
        let genome = two_input_genome([(1.0, Operator::Sum), (2.0, Operator::Sum)], Operator::Sum);
        // (0.5 + 1) + (0.25 + 2)
        let outputs = evaluate(&genome, &[0.5, 0.25]).unwrap();
        assert!((outputs[0] - 3.75).abs() < 1e-6);
    }

    #[test]
    fn test_product_aggregation_first_contribution_assigns() {
        let genome = two_input_genome(
            [(2.0, Operator::Product), (3.0, Operator::Product)],
            Operator::Product,
        );
        // (1 * 2) assigned, then * (2 * 3)
        let outputs = evaluate(&genome, &[1.0, 2.0]).unwrap();
        assert!((outputs[0] - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_disabled_connections_are_inert() {
        let mut genome =
            two_input_genome([(1.0, Operator::Sum), (5.0, Operator::Sum)], Operator::Sum);
        genome.connections_mut()[1].enabled = false;
        let outputs = evaluate(&genome, &[1.0, 1.0]).unwrap();
        assert!((outputs[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_declaration_order_is_respected() {
        // Hidden node fed after it is read: the read sees 0.
        let mut genome = Genome::seed(1, 1);
        let hidden = genome.push_node(NodeGene::hidden());
        genome
            .push_connection(ConnectionGene::new(hidden, 1, 1.0, Operator::Product))
            .unwrap();
        genome
            .push_connection(ConnectionGene::new(0, hidden, 1.0, Operator::Product))
            .unwrap();
        let late = evaluate(&genome, &[3.0]).unwrap();
        assert_eq!(late, vec![0.0]);

        let mut ordered = Genome::seed(1, 1);
        let hidden = ordered.push_node(NodeGene::hidden());
        ordered
            .push_connection(ConnectionGene::new(0, hidden, 1.0, Operator::Product))
            .unwrap();
        ordered
            .push_connection(ConnectionGene::new(hidden, 1, 1.0, Operator::Product))
            .unwrap();
        let on_time = evaluate(&ordered, &[3.0]).unwrap();
        assert!((on_time[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_io_index_selects_sensor_slot() {
        let genome = Genome::new(
            vec![NodeGene::input(1), NodeGene::input(0), NodeGene::output()],
            vec![ConnectionGene::new(0, 2, 1.0, Operator::Product)],
        )
        .unwrap();
        let outputs = evaluate(&genome, &[10.0, 20.0]).unwrap();
        assert!((outputs[0] - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_outputs_follow_node_order() {
        let genome = Genome::new(
            vec![
                NodeGene::output(),
                NodeGene::input(0),
                NodeGene::output(),
            ],
            vec![ConnectionGene::new(1, 2, 1.0, Operator::Sum)],
        )
        .unwrap();
        let outputs = evaluate(&genome, &[4.0]).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0], 0.0);
        assert!((outputs[1] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_input_arity_error() {
        let genome = Genome::seed(2, 1);
        let err = evaluate(&genome, &[1.0]).unwrap_err();
        assert_eq!(
            err,
            EvaluatorError::InputArity {
                expected: 2,
                actual: 1
            }
        );
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_input_index_error() {
        let genome = Genome::new(vec![NodeGene::input(4), NodeGene::output()], vec![]).unwrap();
        let err = evaluate(&genome, &[1.0]).unwrap_err();
        assert_eq!(err, EvaluatorError::InputIndex { io_index: 4, len: 1 });
    }

    #[test]
    fn test_evaluator_deterministic_and_stateless() {
        let genome = two_input_genome(
            [(0.3, Operator::Product), (-1.2, Operator::Sum)],
            Operator::Product,
        );
        let mut ff = FeedForward::new();
        let first = ff.evaluate(&genome, &[0.5, -0.5]).unwrap();
        let _ = ff.evaluate(&genome, &[9.0, 9.0]).unwrap();
        let second = ff.evaluate(&genome, &[0.5, -0.5]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, evaluate(&genome, &[0.5, -0.5]).unwrap());
    }
}
