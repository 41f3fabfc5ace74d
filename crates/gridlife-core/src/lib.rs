//! Core types shared across the GridLife workspace.
//!
//! A [`World`] is a toroidal grid of cells populated by genetically encoded
//! agents, food, trees, mushrooms, and terrain. Each call to [`World::step`]
//! advances the 24-hour clock, ages plants, and lets every agent pick and
//! perform one [`Action`] chosen by the rule cascade in [`decide`].

mod config;
mod decision;
mod entity;
mod evaluate;
mod genome;
mod step;
mod world;

pub use config::GridLifeConfig;
pub use decision::{Action, base_energy_delta, decide, is_asleep};
pub use entity::{
    AgentState, Consumed, DeathCause, Dropping, Entity, EntityId, EntityKind, EntityTag,
    MushroomKind, MushroomState, TreeFruit, TreeState, VisualHandle,
};
pub use evaluate::{RuleEvaluator, SimulationEvaluator, evaluate};
pub use genome::{
    AgentTraits, GENOME_LEN, Genome, GenomeError, SleepPhase, crossover_str, decode,
    mutate_str, mutation_set,
};
pub use gridlife_index::{Cell, GridDims, Heading, IndexError, Relative};
pub use step::{LETHAL_DELTA, apply_energy_change, sickness_death_chance};
pub use world::{DeadAgent, Hazard, Meal, World};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Simulation clock (steps processed since the world was built).
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Errors that can occur when constructing or mutating a world.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Genome(#[from] GenomeError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("unknown entity")]
    UnknownEntity,
    #[error("entity is not an agent")]
    NotAnAgent,
    #[error("cell ({row}, {col}) already holds food")]
    DuplicateFood { row: u32, col: u32 },
    /// The grid and the agent list disagree about an agent.
    #[error("grid consistency violated: {reason}")]
    GhostAgent { reason: &'static str },
}

/// Summary recorded after each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub hour: u8,
    pub agent_count: usize,
    pub births: usize,
    pub deaths: usize,
    pub food_count: usize,
    pub total_energy: i64,
    pub average_energy: f64,
}
