//! Evolve walkers that find the food in the navigation arena.
//!
//! Run with: `RUST_LOG=info cargo run --example navigation`

use symbios_sprout::persist::to_json;
use symbios_sprout::{
    ConnectionGene, Environment, Genome, NavigationArena, Operator, Population, RunConfig,
    Simulation,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Sprout Navigation Arena");
    println!("=======================\n");

    let mut config = RunConfig::default();
    config.seed = Some(7);
    config.tick_cap = Some(600);
    config.population.keep_top = 4;
    config.population.refresh_count = 6;
    config.population.stagnation_threshold = 4;
    config.validate()?;
    let rounds = 25;

    let arena = NavigationArena::new(config.arena.clone());
    println!(
        "Sensors: {} ({} rays), actuators: {}",
        arena.sensor_count(),
        NavigationArena::ray_count(),
        arena.actuator_count()
    );

    // Start from a handful of connections instead of every pair.
    let mut seed = Genome::seed(arena.sensor_count(), arena.actuator_count());
    let forward = seed.nodes().len() - 1;
    seed.push_connection(ConnectionGene::new(0, forward, 1.0, Operator::Sum))?;
    let population = Population::from_seed(config.seeded_population(), &seed)?;
    println!("Initial population: {}", population.len());
    println!();

    let mut sim = Simulation::new(arena, population, config.dt, config.tick_cap);
    let mut best = f32::NEG_INFINITY;
    for _ in 0..rounds {
        let report = sim.run_round()?;
        best = best.max(report.best);
        println!(
            "Round {:3}: best={:.2}, generation={}, stagnation={}, next={}",
            report.round, report.best, report.generation, report.stagnation, report.population
        );
    }

    println!();
    println!("Best fitness: {:.2}", best);
    if let Some(champion) = sim.population().select_top(1).first() {
        println!("Champion record:\n{}", to_json(champion)?);
    }
    Ok(())
}
