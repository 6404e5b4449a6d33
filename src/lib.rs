//! # Symbios Sprout
//!
//! A compact neuroevolution core that grows feed-forward networks from a
//! hand-authored seed while they control agents in a simulated world.
//!
//! ## Features
//!
//! - **Two-Operator Networks**: every connection either adds or multiplies its
//!   weight, and every node aggregates its inputs by sum or product
//! - **Enumerated Mutation**: structural operators return *every* single-step
//!   variant of a parent instead of sampling one
//! - **Stagnation-Driven Growth**: weights are refined until the best score
//!   stalls, then topology is grown
//! - **Portable Snapshots**: genomes round-trip through a plain JSON record
//!   with integer enum codes
//!
//! ## Quick Start
//!
//! ```rust
//! use symbios_sprout::{connection_mutations, evaluate, Genome};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! // Two sensors, one actuator, no connections yet
//! let seed = Genome::seed(2, 1);
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! // One child per candidate pair and weight operator
//! let children = connection_mutations(&seed, -4.0, 4.0, &mut rng);
//! assert_eq!(children.len(), 4);
//!
//! let output = evaluate(&children[0], &[0.5, -0.5]).unwrap();
//! println!("Output: {:?}", output);
//! ```
//!
//! ## Driving a Population
//!
//! ```rust
//! use symbios_sprout::{
//!     Genome, ObstacleConfig, ObstacleCourse, Population, PopulationConfig, Simulation,
//! };
//!
//! let config = PopulationConfig { seed: Some(7), ..PopulationConfig::default() };
//! let population = Population::from_seed(config, &Genome::seed(5, 1)).unwrap();
//! let env = ObstacleCourse::new(ObstacleConfig::default());
//!
//! let mut sim = Simulation::new(env, population, 1.0 / 30.0, Some(300));
//! let reports = sim.run_generations(2).unwrap();
//! assert_eq!(reports.len(), 2);
//! ```
//!
//! ## Architecture
//!
//! ### Position-Addressed Genomes
//!
//! Connections refer to nodes by their position in the genome's node
//! sequence. Nodes are only ever appended, so positions stay valid across
//! every mutation. The node sequence is reference counted: weight-perturbed
//! clones share it and only structural mutations copy it.
//!
//! ### Order-Dependent Evaluation
//!
//! The evaluator walks connections in the order they were added, with no
//! topological sort. Genomes are expected to be built in feed-forward order;
//! anything else evaluates deterministically but order-dependently.

pub mod config;
pub mod evaluator;
pub mod gene;
pub mod genome;
pub mod mutation;
pub mod persist;
pub mod population;
pub mod scenario;

// Re-exports for convenience
pub use config::{ConfigError, RunConfig};
pub use evaluator::{evaluate, EvaluatorError, FeedForward};
pub use gene::{ConnectionGene, GeneId, NodeGene, NodeKind, Operator};
pub use genome::{Genome, GenomeError};
pub use mutation::{
    candidate_pairs, connection_mutations, connection_weight_random_add, insert_node_mutations,
    structural_mutations, ConnectionPair,
};
pub use persist::{
    MemorySnapshots, SchemaError, SnapshotDir, SnapshotError, SnapshotSink,
};
pub use population::{
    rank, ControlPolicy, GenerationReport, GenomePolicy, Individual, Population,
    PopulationConfig, Regime, ScriptedPolicy, Stagnation,
};
pub use scenario::{
    ArenaConfig, BodyState, Environment, NavigationArena, ObstacleConfig, ObstacleCourse,
    Simulation, SimulationError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_grow_then_evaluate() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let seed = Genome::seed(2, 1);

        let connected = connection_mutations(&seed, -1.0, 1.0, &mut rng);
        let split = insert_node_mutations(&connected[0]);
        let perturbed = connection_weight_random_add(&split[0], 3, -0.1, 0.1, &mut rng);

        for genome in &perturbed {
            assert_eq!(genome.num_hidden(), 1);
            let output = evaluate(genome, &[0.25, 0.75]).unwrap();
            assert_eq!(output.len(), 1);
            assert!(output[0].is_finite());
        }
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        let seed = Genome::seed(3, 2);
        let grown = structural_mutations(&seed, -4.0, 4.0, &mut rng).remove(3);
        let grown = insert_node_mutations(&grown).remove(1);

        let json = serde_json::to_string(&grown).expect("Serialization failed");
        let restored: Genome = serde_json::from_str(&json).expect("Deserialization failed");

        assert_eq!(grown, restored);
        assert_eq!(grown.nodes().len(), restored.nodes().len());
        assert_eq!(
            grown.connections().iter().map(|c| &c.id).collect::<Vec<_>>(),
            restored.connections().iter().map(|c| &c.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_run_config_builds_population() {
        let config = RunConfig::from_toml("seed = 5\n[population]\ngrow_perturb_count = 2\n").unwrap();
        let population = Population::from_seed(config.seeded_population(), &Genome::seed(2, 1)).unwrap();
        assert_eq!(population.len(), 4 * 2);
    }
}
