//! Environment boundary and the fixed-step tick loop.
//!
//! An [`Environment`] owns the world and one body per individual. The
//! [`Simulation`] drives it: each tick the world advances once, then every live
//! individual in population order senses, decides and acts. When every body is
//! dead (or the tick cap is reached) fitness is pulled from the environment and
//! the population is reset synchronously before the next tick.

mod arena;
mod obstacle;

pub use arena::{ArenaConfig, HitType, NavigationArena, RayHit, WallRect};
pub use obstacle::{NextColumn, ObstacleConfig, ObstacleCourse};

use thiserror::Error;

use crate::evaluator::EvaluatorError;
use crate::persist::SnapshotError;
use crate::population::{GenerationReport, Population};

/// Errors raised while running a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// An individual's policy could not consume the sensor vector.
    #[error("individual {individual} failed to decide: {source}")]
    Decide {
        individual: usize,
        #[source]
        source: EvaluatorError,
    },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Outcome of applying one tick's actions to a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    Alive,
    Dead,
}

/// A world hosting one body per individual.
///
/// Bodies are addressed by the individual's position in the population.
pub trait Environment {
    /// Per-tick world state shared by every body during that tick.
    type Context;

    /// Length of the sensor vector produced by [`sense`](Self::sense).
    fn sensor_count(&self) -> usize;

    /// Length of the actuator vector consumed by [`apply`](Self::apply).
    fn actuator_count(&self) -> usize;

    /// Start a new round with `bodies` fresh bodies.
    fn reset(&mut self, bodies: usize);

    /// Step world-level state (scrolling, spawning) once per tick.
    fn advance(&mut self, dt: f32) -> Self::Context;

    /// Fill `sensors` for `body`. The buffer is cleared by the implementation.
    fn sense(&self, ctx: &Self::Context, body: usize, sensors: &mut Vec<f32>);

    /// Apply `actions` to `body` and report whether it survived.
    fn apply(&mut self, ctx: &Self::Context, body: usize, actions: &[f32], dt: f32) -> BodyState;

    /// Score accumulated by `body` this round.
    fn fitness(&self, body: usize) -> f32;
}

/// Fixed-step driver tying an environment to a population.
pub struct Simulation<E: Environment> {
    env: E,
    population: Population,
    dt: f32,
    tick_cap: Option<u64>,
    tick: u64,
    sensors: Vec<f32>,
}

impl<E: Environment> Simulation<E> {
    /// Create a simulation and reset the environment for the population.
    pub fn new(mut env: E, population: Population, dt: f32, tick_cap: Option<u64>) -> Self {
        env.reset(population.len());
        let sensors = Vec::with_capacity(env.sensor_count());
        Self {
            env,
            population,
            dt,
            tick_cap,
            tick: 0,
            sensors,
        }
    }

    #[must_use]
    pub fn env(&self) -> &E {
        &self.env
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    /// Ticks elapsed in the current round.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn round_over(&self) -> bool {
        self.population.all_dead() || self.tick_cap.is_some_and(|cap| self.tick >= cap)
    }

    /// Advance one tick. Returns the report if this tick ended the round.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Decide`] if a policy rejects its sensors and
    /// [`SimulationError::Snapshot`] if the reset could not checkpoint.
    pub fn step(&mut self) -> Result<Option<GenerationReport>, SimulationError> {
        if self.round_over() {
            return self.finish_round().map(Some);
        }

        let ctx = self.env.advance(self.dt);
        for (i, individual) in self.population.individuals_mut().iter_mut().enumerate() {
            if !individual.is_alive() {
                continue;
            }
            self.env.sense(&ctx, i, &mut self.sensors);
            let actions = individual
                .decide(&self.sensors)
                .map_err(|source| SimulationError::Decide { individual: i, source })?;
            if self.env.apply(&ctx, i, &actions, self.dt) == BodyState::Dead {
                individual.kill();
            }
        }
        self.tick += 1;

        if self.round_over() {
            return self.finish_round().map(Some);
        }
        Ok(None)
    }

    /// Tick until the current round ends.
    ///
    /// Without a tick cap this only returns once every body has died.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn run_round(&mut self) -> Result<GenerationReport, SimulationError> {
        loop {
            if let Some(report) = self.step()? {
                return Ok(report);
            }
        }
    }

    /// Run `rounds` complete rounds, returning one report per reset.
    ///
    /// # Errors
    ///
    /// See [`step`](Self::step).
    pub fn run_generations(&mut self, rounds: usize) -> Result<Vec<GenerationReport>, SimulationError> {
        (0..rounds).map(|_| self.run_round()).collect()
    }

    fn finish_round(&mut self) -> Result<GenerationReport, SimulationError> {
        for (i, individual) in self.population.individuals_mut().iter_mut().enumerate() {
            individual.kill();
            individual.set_fitness(self.env.fitness(i));
        }
        let report = self.population.reset()?;
        log::debug!("round {} ended after {} ticks", report.round, self.tick);
        self.env.reset(self.population.len());
        self.tick = 0;
        Ok(report)
    }
}
