//! Benchmarks for symbios-sprout.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use symbios_sprout::{
    connection_mutations, connection_weight_random_add, evaluate, insert_node_mutations,
    structural_mutations, FeedForward, Genome, Population, PopulationConfig,
};

/// A seed grown a few structural steps so benches see hidden nodes.
fn grown_genome(rng: &mut ChaCha8Rng) -> Genome {
    let mut genome = Genome::seed(5, 2);
    for step in 0..6 {
        let mut children = structural_mutations(&genome, -4.0, 4.0, rng);
        let pick = (step * 7) % children.len();
        genome = children.swap_remove(pick);
    }
    genome
}

fn bench_evaluation(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&mut rng);
    let inputs = [0.1, -0.4, 0.9, 0.0, 0.5];

    c.bench_function("evaluate_single", |b| {
        b.iter(|| {
            black_box(evaluate(&genome, &inputs).unwrap());
        });
    });

    let mut evaluator = FeedForward::new();
    let mut outputs = Vec::new();
    c.bench_function("evaluate_reused_buffer", |b| {
        b.iter(|| {
            evaluator.evaluate_into(&genome, &inputs, &mut outputs).unwrap();
            black_box(&outputs);
        });
    });
}

fn bench_mutation(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&mut rng);

    c.bench_function("connection_mutations", |b| {
        b.iter(|| {
            black_box(connection_mutations(&genome, -4.0, 4.0, &mut rng));
        });
    });

    c.bench_function("insert_node_mutations", |b| {
        b.iter(|| {
            black_box(insert_node_mutations(&genome));
        });
    });

    c.bench_function("connection_weight_random_add_10", |b| {
        b.iter(|| {
            black_box(connection_weight_random_add(&genome, 10, -0.5, 0.5, &mut rng));
        });
    });
}

fn scored_population(config: &PopulationConfig) -> Population {
    let mut population = Population::from_seed(config.clone(), &Genome::seed(5, 2)).unwrap();
    for (i, individual) in population.individuals_mut().iter_mut().enumerate() {
        individual.set_fitness(i as f32);
        individual.kill();
    }
    population
}

fn bench_reset(c: &mut Criterion) {
    let refresh = PopulationConfig {
        seed: Some(42),
        stagnation_threshold: usize::MAX,
        ..PopulationConfig::default()
    };
    let grow = PopulationConfig {
        stagnation_threshold: 0,
        snapshot_on_grow: false,
        ..refresh.clone()
    };

    c.bench_function("population_reset_refresh", |b| {
        b.iter_batched(
            || scored_population(&refresh),
            |mut population| black_box(population.reset().unwrap()),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("population_reset_grow", |b| {
        b.iter_batched(
            || scored_population(&grow),
            |mut population| black_box(population.reset().unwrap()),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_evaluation, bench_mutation, bench_reset);
criterion_main!(benches);
