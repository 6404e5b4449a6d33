//! Evolve jump policies for the headless obstacle course.
//!
//! Run with: `RUST_LOG=info cargo run --example obstacle_course`

use symbios_sprout::{
    Environment, Genome, ObstacleCourse, Population, Regime, RunConfig, Simulation, SnapshotDir,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Sprout Obstacle Course");
    println!("======================\n");

    let config = RunConfig::from_toml(
        r#"
        seed = 42
        tick_cap = 1800

        [population]
        keep_top = 5
        stagnation_threshold = 5
        refresh_count = 8
        grow_sample = 12
        grow_perturb_count = 3
        "#,
    )?;
    let rounds = 40;
    let snapshots = tempfile::tempdir()?;

    let course = ObstacleCourse::new(config.obstacle.clone());
    let seed = Genome::seed(course.sensor_count(), course.actuator_count());
    let population = Population::from_seed(config.seeded_population(), &seed)?
        .with_snapshots(Box::new(SnapshotDir::new(snapshots.path())?));

    println!("Initial population: {}", population.len());
    println!("Rounds: {}", rounds);
    println!();

    let mut sim = Simulation::new(course, population, config.dt, config.tick_cap);
    for _ in 0..rounds {
        let report = sim.run_round()?;
        if report.round % 5 == 0 || report.regime == Some(Regime::Grow) {
            println!(
                "Round {:3}: best={:.2}s, high={:.2}s, generation={}, regime={:?}, next={}",
                report.round,
                report.best,
                report.high_water,
                report.generation,
                report.regime,
                report.population
            );
        }
    }

    let written = sim.population_mut().emergency_snapshot()?;
    let dir = SnapshotDir::new(snapshots.path())?;
    println!();
    println!("Snapshots: {:?}", dir.labels()?);
    println!("Emergency snapshot holds {} genomes", written);

    if let Some(champion) = sim.population().select_top(1).first() {
        println!("Champion nodes: {}", champion.nodes().len());
        println!("Champion connections: {}", champion.num_enabled_connections());
        println!("Hidden nodes: {}", champion.num_hidden());
    }
    Ok(())
}
