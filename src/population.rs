//! Population controller.
//!
//! A [`Population`] owns its individuals and the shared random generator. The
//! environment ticks individuals until all are dead (or a cap is hit), then
//! calls [`Population::reset`], which ranks by fitness, updates the stagnation
//! counter, and rebuilds the population under one of two regimes:
//!
//! - **Refresh**: the top-K genomes are weight-perturbed with topology frozen.
//! - **Grow**: the top-K genomes receive every structural mutation, a random
//!   subsample of the variants is weight-perturbed, and the generation counter
//!   advances.
//!
//! Population size is an outcome of the regime and is not constant across rounds.

use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::evaluator::{EvaluatorError, FeedForward};
use crate::genome::Genome;
use crate::mutation::{connection_mutations, connection_weight_random_add, structural_mutations};
use crate::persist::{SnapshotError, SnapshotSink};

/// Label used by [`Population::emergency_snapshot`].
pub const EMERGENCY_LABEL: &str = "emergency";

/// Configuration for selection and reproduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Number of top-ranked individuals kept as parents (K).
    pub keep_top: usize,
    /// Rounds without a new best before switching to the grow regime.
    pub stagnation_threshold: usize,
    /// High-water mark before the first round. A round's best must beat it
    /// to count as an improvement.
    pub high_score_floor: f32,
    /// Perturbed clones per parent in the refresh regime.
    pub refresh_count: usize,
    /// Structural variants sampled from the pooled grow mutations.
    pub grow_sample: usize,
    /// Perturbed clones per sampled structural variant.
    pub grow_perturb_count: usize,
    /// Range for the weight of a newly added connection.
    pub weight_min: f32,
    pub weight_max: f32,
    /// Range for the additive weight perturbation.
    pub delta_min: f32,
    pub delta_max: f32,
    /// Write the top-K genomes to the snapshot sink before each growth step.
    pub snapshot_on_grow: bool,
    /// Seed for the shared generator. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            keep_top: 5,
            stagnation_threshold: 10,
            high_score_floor: 0.0,
            refresh_count: 10,
            grow_sample: 20,
            grow_perturb_count: 3,
            weight_min: -4.0,
            weight_max: 4.0,
            delta_min: -0.5,
            delta_max: 0.5,
            snapshot_on_grow: true,
            seed: None,
        }
    }
}

/// Bounds must be finite and ordered, and their width must fit in an `f32`
/// so that uniform sampling over them cannot overflow.
fn check_range(name: &str, min: f32, max: f32) -> Result<(), ConfigError> {
    for (end, value) in [("min", min), ("max", max)] {
        if !value.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "population.{name}_{end} ({value}) must be finite"
            )));
        }
    }
    if min > max {
        return Err(ConfigError::Invalid(format!(
            "population.{name}_min ({min}) exceeds {name}_max ({max})"
        )));
    }
    if !(max - min).is_finite() {
        return Err(ConfigError::Invalid(format!(
            "population.{name} range {min}..{max} is too wide to sample"
        )));
    }
    Ok(())
}

impl PopulationConfig {
    /// Check that reproduction can never produce an empty population and that
    /// every mutation range can be sampled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("keep_top", self.keep_top),
            ("refresh_count", self.refresh_count),
            ("grow_sample", self.grow_sample),
            ("grow_perturb_count", self.grow_perturb_count),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("population.{name} must be at least 1")));
            }
        }
        check_range("weight", self.weight_min, self.weight_max)?;
        check_range("delta", self.delta_min, self.delta_max)?;
        if !self.high_score_floor.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "population.high_score_floor ({}) must be finite",
                self.high_score_floor
            )));
        }
        Ok(())
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        }
    }
}

/// Decides an actuator vector from a sensor vector.
///
/// Individuals are driven either by an evolved genome or by a fixed
/// (scripted or human) policy behind this one interface.
pub trait ControlPolicy {
    /// Produce the actuator vector for this tick.
    ///
    /// # Errors
    ///
    /// Genome-backed policies propagate [`EvaluatorError`] when the sensor
    /// vector does not fit the genome.
    fn decide(&mut self, sensors: &[f32]) -> Result<Vec<f32>, EvaluatorError>;

    /// The genome behind this policy, if it is evolvable.
    fn genome(&self) -> Option<&Genome> {
        None
    }
}

/// Policy that evaluates a genome.
#[derive(Debug, Clone)]
pub struct GenomePolicy {
    genome: Genome,
    scratch: FeedForward,
}

impl GenomePolicy {
    #[must_use]
    pub fn new(genome: Genome) -> Self {
        Self {
            genome,
            scratch: FeedForward::new(),
        }
    }
}

impl ControlPolicy for GenomePolicy {
    fn decide(&mut self, sensors: &[f32]) -> Result<Vec<f32>, EvaluatorError> {
        self.scratch.evaluate(&self.genome, sensors)
    }

    fn genome(&self) -> Option<&Genome> {
        Some(&self.genome)
    }
}

/// Policy backed by a closure, for manual play or scripted baselines.
pub struct ScriptedPolicy<F> {
    script: F,
}

impl<F> ScriptedPolicy<F>
where
    F: FnMut(&[f32]) -> Vec<f32>,
{
    pub fn new(script: F) -> Self {
        Self { script }
    }
}

impl<F> ControlPolicy for ScriptedPolicy<F>
where
    F: FnMut(&[f32]) -> Vec<f32>,
{
    fn decide(&mut self, sensors: &[f32]) -> Result<Vec<f32>, EvaluatorError> {
        Ok((self.script)(sensors))
    }
}

/// One member of the population.
pub struct Individual {
    policy: Box<dyn ControlPolicy>,
    alive: bool,
    fitness: f32,
    ticks: u64,
}

impl std::fmt::Debug for Individual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Individual")
            .field("alive", &self.alive)
            .field("fitness", &self.fitness)
            .field("ticks", &self.ticks)
            .field("genome", &self.policy.genome().is_some())
            .finish()
    }
}

impl Individual {
    pub fn new(policy: Box<dyn ControlPolicy>) -> Self {
        Self {
            policy,
            alive: true,
            fitness: 0.0,
            ticks: 0,
        }
    }

    #[must_use]
    pub fn from_genome(genome: Genome) -> Self {
        Self::new(Box::new(GenomePolicy::new(genome)))
    }

    pub fn scripted<F>(script: F) -> Self
    where
        F: FnMut(&[f32]) -> Vec<f32> + 'static,
    {
        Self::new(Box::new(ScriptedPolicy::new(script)))
    }

    /// Run the control policy for one tick.
    ///
    /// # Errors
    ///
    /// See [`ControlPolicy::decide`].
    pub fn decide(&mut self, sensors: &[f32]) -> Result<Vec<f32>, EvaluatorError> {
        let actions = self.policy.decide(sensors)?;
        self.ticks += 1;
        Ok(actions)
    }

    #[must_use]
    pub fn genome(&self) -> Option<&Genome> {
        self.policy.genome()
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    #[must_use]
    pub fn fitness(&self) -> f32 {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f32) {
        self.fitness = fitness;
    }

    /// Per-tick scoring hook.
    pub fn reward(&mut self, amount: f32) {
        self.fitness += amount;
    }

    /// Ticks this individual has been driven since it last spawned.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Bring the individual back with its policy unchanged and a clean score.
    pub fn respawn(&mut self) {
        self.alive = true;
        self.fitness = 0.0;
        self.ticks = 0;
    }
}

/// Reproduction regime chosen at a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// Weight perturbation of the survivors only.
    Refresh,
    /// Structural mutation, subsampling, then weight perturbation.
    Grow,
}

/// Tracks rounds since the best fitness last improved.
#[derive(Debug, Clone, PartialEq)]
pub struct Stagnation {
    high_water: f32,
    rounds: usize,
    threshold: usize,
}

impl Stagnation {
    /// A tracker whose high-water mark starts at zero.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self::with_floor(threshold, 0.0)
    }

    /// A tracker whose high-water mark starts at `floor`.
    #[must_use]
    pub fn with_floor(threshold: usize, floor: f32) -> Self {
        Self {
            high_water: floor,
            rounds: 0,
            threshold,
        }
    }

    /// Record a round's best score. Returns `true` if it beat the high-water
    /// mark, which resets the counter; otherwise the counter increments.
    ///
    /// A score equal to the mark is not an improvement. NaN never is.
    pub fn record(&mut self, score: f32) -> bool {
        let improved = score > self.high_water;
        if improved {
            self.high_water = score;
            self.rounds = 0;
        } else {
            self.rounds += 1;
        }
        improved
    }

    #[must_use]
    pub fn regime(&self) -> Regime {
        if self.rounds >= self.threshold {
            Regime::Grow
        } else {
            Regime::Refresh
        }
    }

    /// Clear the counter after a growth step. The high-water mark is kept.
    pub fn reset_rounds(&mut self) {
        self.rounds = 0;
    }

    #[must_use]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    #[must_use]
    pub fn high_water(&self) -> f32 {
        self.high_water
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

/// Indices of `individuals` sorted by descending fitness.
///
/// The sort is stable, so ties keep population order. NaN scores rank last.
#[must_use]
pub fn rank(individuals: &[Individual]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..individuals.len()).collect();
    order.sort_by(|&a, &b| {
        let (fa, fb) = (individuals[a].fitness, individuals[b].fitness);
        fa.is_nan().cmp(&fb.is_nan()).then_with(|| fb.total_cmp(&fa))
    });
    order
}

/// Summary of one reset.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// Resets performed so far, including this one.
    pub round: u64,
    /// Growth steps performed so far.
    pub generation: u64,
    /// `None` when a single individual was respawned without reproduction.
    pub regime: Option<Regime>,
    pub best: f32,
    pub improved: bool,
    pub high_water: f32,
    /// Stagnation counter after this reset.
    pub stagnation: usize,
    /// Size of the new population.
    pub population: usize,
}

/// The population controller.
pub struct Population {
    individuals: Vec<Individual>,
    config: PopulationConfig,
    stagnation: Stagnation,
    generation: u64,
    round: u64,
    rng: ChaCha8Rng,
    snapshots: Option<Box<dyn SnapshotSink>>,
}

impl std::fmt::Debug for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Population")
            .field("individuals", &self.individuals.len())
            .field("stagnation", &self.stagnation)
            .field("generation", &self.generation)
            .field("round", &self.round)
            .field("snapshots", &self.snapshots.is_some())
            .finish()
    }
}

impl Population {
    /// Build a population from individuals.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the config fails validation or
    /// `individuals` is empty.
    pub fn from_individuals(
        config: PopulationConfig,
        individuals: Vec<Individual>,
    ) -> Result<Self, ConfigError> {
        let rng = config.rng();
        Self::with_rng(config, individuals, rng)
    }

    /// Like [`from_individuals`](Self::from_individuals) with an explicit generator.
    ///
    /// # Errors
    ///
    /// See [`from_individuals`](Self::from_individuals).
    pub fn with_rng(
        config: PopulationConfig,
        individuals: Vec<Individual>,
        rng: ChaCha8Rng,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if individuals.is_empty() {
            return Err(ConfigError::Invalid("initial population is empty".into()));
        }
        Ok(Self {
            individuals,
            stagnation: Stagnation::with_floor(config.stagnation_threshold, config.high_score_floor),
            config,
            generation: 0,
            round: 0,
            rng,
            snapshots: None,
        })
    }

    /// Build a population with one genome-backed individual per genome.
    ///
    /// # Errors
    ///
    /// See [`from_individuals`](Self::from_individuals).
    pub fn new(config: PopulationConfig, genomes: Vec<Genome>) -> Result<Self, ConfigError> {
        Self::from_individuals(config, genomes.into_iter().map(Individual::from_genome).collect())
    }

    /// Expand a hand-authored seed into a first population: every
    /// add-connection variant of the seed, each weight-perturbed
    /// `grow_perturb_count` times. A seed with no candidate connections is
    /// used as-is.
    ///
    /// # Errors
    ///
    /// See [`from_individuals`](Self::from_individuals).
    pub fn from_seed(config: PopulationConfig, seed: &Genome) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = config.rng();
        let variants = connection_mutations(seed, config.weight_min, config.weight_max, &mut rng);
        let genomes: Vec<Genome> = if variants.is_empty() {
            vec![seed.clone()]
        } else {
            variants
                .iter()
                .flat_map(|v| {
                    connection_weight_random_add(
                        v,
                        config.grow_perturb_count,
                        config.delta_min,
                        config.delta_max,
                        &mut rng,
                    )
                })
                .collect()
        };
        Self::with_rng(
            config,
            genomes.into_iter().map(Individual::from_genome).collect(),
            rng,
        )
    }

    /// Attach a sink for generation and emergency snapshots.
    #[must_use]
    pub fn with_snapshots(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.snapshots = Some(sink);
        self
    }

    #[must_use]
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn individuals_mut(&mut self) -> &mut [Individual] {
        &mut self.individuals
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    #[must_use]
    pub fn all_dead(&self) -> bool {
        self.individuals.iter().all(|i| !i.is_alive())
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.individuals.iter().filter(|i| i.is_alive()).count()
    }

    #[must_use]
    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    #[must_use]
    pub fn stagnation(&self) -> &Stagnation {
        &self.stagnation
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Genomes of the `k` best genome-backed individuals, best first.
    ///
    /// Has no side effects; shared by [`reset`](Self::reset) and
    /// [`emergency_snapshot`](Self::emergency_snapshot).
    #[must_use]
    pub fn select_top(&self, k: usize) -> Vec<Genome> {
        rank(&self.individuals)
            .into_iter()
            .filter_map(|i| self.individuals[i].genome().cloned())
            .take(k)
            .collect()
    }

    /// Score, rank and regenerate the population.
    ///
    /// Fitness must already be recorded on each individual. A single-member
    /// population is respawned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if a growth checkpoint cannot be written. The
    /// population is left exactly as it was, so the reset can be retried with
    /// the same scores.
    ///
    /// # Panics
    ///
    /// Panics if the population is empty.
    pub fn reset(&mut self) -> Result<GenerationReport, SnapshotError> {
        assert!(!self.individuals.is_empty(), "reset called on an empty population");

        if self.individuals.len() == 1 {
            self.round += 1;
            let best = self.individuals[0].fitness();
            self.individuals[0].respawn();
            return Ok(self.report(None, best, false));
        }

        let order = rank(&self.individuals);
        let best = self.individuals[order[0]].fitness();
        let mut stagnation = self.stagnation.clone();
        let improved = stagnation.record(best);
        let regime = stagnation.regime();

        let survivors = self.select_top(self.config.keep_top);
        if survivors.is_empty() {
            log::warn!("no genome-backed individuals to reproduce; respawning unchanged");
            self.round += 1;
            self.stagnation = stagnation;
            self.individuals.iter_mut().for_each(Individual::respawn);
            return Ok(self.report(Some(regime), best, improved));
        }

        // The checkpoint is the only fallible step; nothing is committed before it.
        if regime == Regime::Grow && self.config.snapshot_on_grow {
            if let Some(sink) = self.snapshots.as_mut() {
                sink.write(&format!("generation-{}", self.generation), &survivors)?;
            }
        }
        self.round += 1;
        self.stagnation = stagnation;

        let next = match regime {
            Regime::Refresh => self.refresh(&survivors),
            Regime::Grow => match self.grow(&survivors) {
                Some(next) => {
                    self.stagnation.reset_rounds();
                    self.generation += 1;
                    next
                }
                None => {
                    log::warn!("no structural variants available; refreshing instead");
                    self.refresh(&survivors)
                }
            },
        };

        self.individuals = next.into_iter().map(Individual::from_genome).collect();
        let report = self.report(Some(regime), best, improved);
        log::info!(
            "round {} generation {}: best {:.3} (high water {:.3}), {:?}, stagnation {}/{}, next population {}",
            report.round,
            report.generation,
            report.best,
            report.high_water,
            regime,
            report.stagnation,
            self.stagnation.threshold(),
            report.population
        );
        Ok(report)
    }

    /// Write the current top-K genomes under [`EMERGENCY_LABEL`].
    ///
    /// Returns the number of genomes written, or `0` if no sink is attached.
    ///
    /// # Errors
    ///
    /// Propagates sink failures.
    pub fn emergency_snapshot(&mut self) -> Result<usize, SnapshotError> {
        let top = self.select_top(self.config.keep_top);
        match self.snapshots.as_mut() {
            Some(sink) => {
                sink.write(EMERGENCY_LABEL, &top)?;
                log::info!("emergency snapshot of {} genomes written", top.len());
                Ok(top.len())
            }
            None => Ok(0),
        }
    }

    fn refresh(&mut self, survivors: &[Genome]) -> Vec<Genome> {
        let c = &self.config;
        let mut next = Vec::with_capacity(survivors.len() * c.refresh_count);
        for genome in survivors {
            next.extend(connection_weight_random_add(
                genome,
                c.refresh_count,
                c.delta_min,
                c.delta_max,
                &mut self.rng,
            ));
        }
        next
    }

    fn grow(&mut self, survivors: &[Genome]) -> Option<Vec<Genome>> {
        let c = &self.config;
        let pool: Vec<Genome> = survivors
            .iter()
            .flat_map(|g| structural_mutations(g, c.weight_min, c.weight_max, &mut self.rng))
            .collect();
        if pool.is_empty() {
            return None;
        }

        let amount = c.grow_sample.min(pool.len());
        log::debug!("sampling {amount} of {} structural variants", pool.len());
        let picked = index::sample(&mut self.rng, pool.len(), amount);

        let mut next = Vec::with_capacity(amount * c.grow_perturb_count);
        for i in picked {
            next.extend(connection_weight_random_add(
                &pool[i],
                c.grow_perturb_count,
                c.delta_min,
                c.delta_max,
                &mut self.rng,
            ));
        }
        Some(next)
    }

    fn report(&self, regime: Option<Regime>, best: f32, improved: bool) -> GenerationReport {
        GenerationReport {
            round: self.round,
            generation: self.generation,
            regime,
            best,
            improved,
            high_water: self.stagnation.high_water(),
            stagnation: self.stagnation.rounds(),
            population: self.individuals.len(),
        }
    }
}
