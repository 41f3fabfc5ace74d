//! Fitness evaluation of a genetic string.

use crate::WorldError;
use crate::config::GridLifeConfig;
use crate::genome::Genome;
use crate::world::World;
use tracing::debug;

/// Callback used by rule-search drivers to score candidate genetic strings.
pub trait RuleEvaluator {
    /// Mean survival time of a population carrying `rule`.
    fn evaluate(&mut self, rule: &str) -> Result<f64, WorldError>;
}

/// Scores rules by running a fresh world built from a fixed configuration.
#[derive(Debug, Clone)]
pub struct SimulationEvaluator {
    config: GridLifeConfig,
}

impl SimulationEvaluator {
    #[must_use]
    pub fn new(config: GridLifeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &GridLifeConfig {
        &self.config
    }
}

impl RuleEvaluator for SimulationEvaluator {
    fn evaluate(&mut self, rule: &str) -> Result<f64, WorldError> {
        evaluate(&self.config, rule)
    }
}

/// Build a world in which every initial agent carries `rule`, run it until the
/// population dies out or `max_steps` elapse, and return the mean survival time.
pub fn evaluate(config: &GridLifeConfig, rule: &str) -> Result<f64, WorldError> {
    let genome: Genome = rule.parse()?;
    let config = GridLifeConfig {
        genomes: vec![genome.to_string()],
        ..config.clone()
    };
    let budget = config.max_steps;
    let mut world = World::new(config)?;
    for _ in 0..budget {
        if !world.step()? {
            break;
        }
    }
    let fitness = world.mean_survival();
    debug!(
        %genome,
        steps = world.tick().0,
        survivors = world.agent_count(),
        dead = world.dead_agents().len(),
        fitness,
        "rule evaluated"
    );
    Ok(fitness)
}

impl World {
    /// Evaluate `rule` in a fresh world built from this world's configuration.
    pub fn evaluate(&self, rule: &str) -> Result<f64, WorldError> {
        evaluate(&self.config, rule)
    }
}
