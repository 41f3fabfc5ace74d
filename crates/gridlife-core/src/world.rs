//! World state: the entity arena, the cell index, and the flat per-kind lists.
//!
//! The world is the single source of truth for "what is where". Positions only
//! change through [`World::place`], [`World::remove`] and [`World::move_agent`],
//! which keep the arena, the cell index, and the flat lists in agreement.

use crate::config::GridLifeConfig;
use crate::entity::{
    AgentState, DeathCause, Dropping, Entity, EntityId, EntityKind, EntityTag, MushroomKind,
    MushroomState, TreeFruit, TreeState,
};
use crate::genome::Genome;
use crate::{Tick, TickSummary, WorldError};
use gridlife_index::{Cell, CellIndex, GridDims, Heading};
use rand::{Rng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

/// Record of a reaped agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadAgent {
    pub id: EntityId,
    pub genome: Genome,
    pub color: u8,
    pub cell: Cell,
    pub born: Tick,
    pub died: Tick,
    pub lifespan: u64,
    pub cause: DeathCause,
}

/// One eating event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meal {
    pub tick: Tick,
    pub cell: Cell,
    pub eater: EntityId,
    /// Set when the meal was a mushroom.
    pub mushroom: Option<MushroomKind>,
}

/// How the terrain under an agent treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hazard {
    None,
    /// The agent cannot survive here.
    Lethal,
    /// The agent would not survive here but is flying over it.
    Hover,
}

/// Aggregate world state shared by the simulation and its observers.
pub struct World {
    pub(crate) config: GridLifeConfig,
    pub(crate) dims: GridDims,
    pub(crate) rng: SmallRng,
    pub(crate) tick: Tick,
    pub(crate) hour: u8,
    pub(crate) entities: SlotMap<EntityId, Entity>,
    pub(crate) cells: CellIndex<EntityId>,
    pub(crate) agents: Vec<EntityId>,
    pub(crate) food: Vec<EntityId>,
    pub(crate) trees: Vec<EntityId>,
    pub(crate) mushrooms: Vec<EntityId>,
    pub(crate) dead: Vec<DeadAgent>,
    pub(crate) eaten_food: Vec<Meal>,
    pub(crate) eaten_mushrooms: Vec<Meal>,
    pub(crate) history: VecDeque<TickSummary>,
    pub(crate) births: usize,
    pub(crate) deaths: usize,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("dims", &self.dims)
            .field("tick", &self.tick)
            .field("hour", &self.hour)
            .field("agent_count", &self.agents.len())
            .field("entity_count", &self.entities.len())
            .field("dead_count", &self.dead.len())
            .finish()
    }
}

impl World {
    /// Build and populate a world from `config`.
    pub fn new(config: GridLifeConfig) -> Result<Self, WorldError> {
        let (dims, genomes) = config.validate()?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        let mut world = Self {
            dims,
            rng,
            tick: Tick::zero(),
            hour: config.start_hour,
            entities: SlotMap::with_key(),
            cells: CellIndex::new(dims),
            agents: Vec::new(),
            food: Vec::new(),
            trees: Vec::new(),
            mushrooms: Vec::new(),
            dead: Vec::new(),
            eaten_food: Vec::new(),
            eaten_mushrooms: Vec::new(),
            history: VecDeque::with_capacity(history_capacity),
            births: 0,
            deaths: 0,
            config,
        };
        let mut rng = world.rng.clone();
        world.populate(&genomes, &mut rng)?;
        world.rng = rng;
        debug!(
            rows = dims.rows,
            cols = dims.cols,
            agents = world.agents.len(),
            trees = world.trees.len(),
            mushrooms = world.mushrooms.len(),
            food = world.food.len(),
            "world constructed"
        );
        Ok(world)
    }

    fn populate(&mut self, genomes: &[Genome], rng: &mut SmallRng) -> Result<(), WorldError> {
        for (kind, count) in [
            (EntityKind::Grass, self.config.grass),
            (EntityKind::Sand, self.config.sand),
            (EntityKind::Snow, self.config.snow),
        ] {
            self.scatter(
                count,
                rng,
                |world, cell| !world.has_cosmetic(cell),
                |_| kind.clone(),
            )?;
        }

        let radius = self.config.cluster_radius;
        for _ in 0..self.config.lakes {
            let centre = self.random_cell(rng);
            self.cluster(
                centre,
                radius,
                self.config.water_per_lake,
                rng,
                |world, cell| world.obstacle_at(cell).is_none(),
                |_| EntityKind::Water,
            )?;
        }
        self.scatter(
            self.config.stones,
            rng,
            |world, cell| world.obstacle_at(cell).is_none(),
            |_| EntityKind::Stone,
        )?;
        self.scatter(
            self.config.pits,
            rng,
            |world, cell| world.obstacle_at(cell).is_none(),
            |_| EntityKind::Pit,
        )?;

        let bloom = self.config.tree_bloom_steps;
        for _ in 0..self.config.tree_clusters {
            let centre = self.random_cell(rng);
            self.cluster(
                centre,
                radius,
                self.config.trees_per_cluster,
                rng,
                |world, cell| world.obstacle_at(cell).is_none() && world.trees_at(cell).is_empty(),
                |rng| {
                    if rng.random_bool(0.5) {
                        EntityKind::Tree(TreeState::new(TreeFruit::Fruiting, 0))
                    } else {
                        EntityKind::Tree(TreeState::new(
                            TreeFruit::Barren,
                            rng.random_range(1..=bloom),
                        ))
                    }
                },
            )?;
        }

        let growth = self.config.mushroom_growth_steps;
        for _ in 0..self.config.mushroom_clusters {
            let centre = self.random_cell(rng);
            let kind = MushroomKind::ALL[rng.random_range(0..MushroomKind::ALL.len())];
            self.cluster(
                centre,
                radius,
                self.config.mushrooms_per_cluster,
                rng,
                |world, cell| {
                    world.obstacle_at(cell).is_none() && world.mushrooms_at(cell).is_empty()
                },
                |rng| {
                    let grown = rng.random_bool(0.5);
                    EntityKind::Mushroom(MushroomState {
                        kind,
                        dropping: if grown {
                            Dropping::Mushroom
                        } else {
                            Dropping::Spores
                        },
                        steps_until_grown: if grown {
                            0
                        } else {
                            rng.random_range(1..=growth)
                        },
                    })
                },
            )?;
        }

        self.scatter(
            self.config.food,
            rng,
            |world, cell| world.obstacle_at(cell).is_none() && world.food_at(cell).is_none(),
            |_| EntityKind::Food,
        )?;

        let mut attempts = self.attempt_budget(self.config.initial_agents);
        let mut spawned = 0;
        while spawned < self.config.initial_agents && attempts > 0 {
            attempts -= 1;
            let cell = self.random_cell(rng);
            if self.obstacle_at(cell).is_some() {
                continue;
            }
            let genome = genomes[spawned % genomes.len()];
            let heading = random_heading(rng);
            self.spawn_agent_with(genome, cell, heading, rng)?;
            spawned += 1;
        }
        if spawned < self.config.initial_agents {
            debug!(
                requested = self.config.initial_agents,
                spawned, "ran out of free cells while seeding agents"
            );
        }
        Ok(())
    }

    fn attempt_budget(&self, count: usize) -> usize {
        count.saturating_mul(4).max(self.dims.area())
    }

    /// Place up to `count` entities on random cells accepted by `accept`.
    fn scatter<A, K>(
        &mut self,
        count: usize,
        rng: &mut SmallRng,
        accept: A,
        mut make: K,
    ) -> Result<usize, WorldError>
    where
        A: Fn(&World, Cell) -> bool,
        K: FnMut(&mut SmallRng) -> EntityKind,
    {
        let mut attempts = self.attempt_budget(count);
        let mut placed = 0;
        while placed < count && attempts > 0 {
            attempts -= 1;
            let cell = self.random_cell(rng);
            if !accept(self, cell) {
                continue;
            }
            let kind = make(rng);
            self.place(Entity::new(kind, cell, self.tick))?;
            placed += 1;
        }
        Ok(placed)
    }

    /// Place up to `count` entities within `radius` of `centre`.
    fn cluster<A, K>(
        &mut self,
        centre: Cell,
        radius: u32,
        count: usize,
        rng: &mut SmallRng,
        accept: A,
        mut make: K,
    ) -> Result<usize, WorldError>
    where
        A: Fn(&World, Cell) -> bool,
        K: FnMut(&mut SmallRng) -> EntityKind,
    {
        let r = i64::from(radius);
        let mut attempts = count.saturating_mul(4);
        let mut placed = 0;
        while placed < count && attempts > 0 {
            attempts -= 1;
            let cell = self.dims.offset(
                centre,
                rng.random_range(-r..=r),
                rng.random_range(-r..=r),
            );
            if !accept(self, cell) {
                continue;
            }
            let kind = make(rng);
            self.place(Entity::new(kind, cell, self.tick))?;
            placed += 1;
        }
        Ok(placed)
    }

    pub(crate) fn random_cell<R: Rng>(&self, rng: &mut R) -> Cell {
        Cell::new(
            rng.random_range(0..self.dims.rows),
            rng.random_range(0..self.dims.cols),
        )
    }

    // ----- grid mutators -------------------------------------------------

    /// Insert `entity` at its position. A cell never holds more than one food item.
    pub fn place(&mut self, entity: Entity) -> Result<EntityId, WorldError> {
        let cell = entity.position;
        if !self.dims.contains(cell) {
            return Err(gridlife_index::IndexError::OutOfBounds {
                row: cell.row,
                col: cell.col,
            }
            .into());
        }
        if entity.tag() == EntityTag::Food && self.food_at(cell).is_some() {
            return Err(WorldError::DuplicateFood {
                row: cell.row,
                col: cell.col,
            });
        }
        let tag = entity.tag();
        let id = self.entities.insert(entity);
        self.cells.insert(cell, id)?;
        match tag {
            EntityTag::Agent => self.agents.push(id),
            EntityTag::Food => self.food.push(id),
            EntityTag::Tree => self.trees.push(id),
            EntityTag::Mushroom => self.mushrooms.push(id),
            _ => {}
        }
        Ok(id)
    }

    /// Remove `id` from the grid and every index, returning the entity.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity, WorldError> {
        let entity = self.entities.get(id).ok_or(WorldError::UnknownEntity)?;
        let cell = entity.position;
        let tag = entity.tag();
        self.cells.remove(cell, id).map_err(|_| WorldError::GhostAgent {
            reason: "entity missing from the cell it claims to occupy",
        })?;
        match tag {
            EntityTag::Agent => {
                let pos = self
                    .agents
                    .iter()
                    .position(|a| *a == id)
                    .ok_or(WorldError::GhostAgent {
                        reason: "agent in the grid but not in the agent list",
                    })?;
                self.agents.remove(pos);
            }
            EntityTag::Food => self.food.retain(|f| *f != id),
            EntityTag::Tree => self.trees.retain(|t| *t != id),
            EntityTag::Mushroom => self.mushrooms.retain(|m| *m != id),
            _ => {}
        }
        self.entities.remove(id).ok_or(WorldError::UnknownEntity)
    }

    /// Move an agent to `to`, then verify it occupies exactly that cell.
    pub fn move_agent(&mut self, id: EntityId, to: Cell) -> Result<(), WorldError> {
        let entity = self.entities.get_mut(id).ok_or(WorldError::UnknownEntity)?;
        if entity.tag() != EntityTag::Agent {
            return Err(WorldError::NotAnAgent);
        }
        let from = entity.position;
        self.cells
            .relocate(id, from, to)
            .map_err(|err| match err {
                gridlife_index::IndexError::MissingKey { .. } => WorldError::GhostAgent {
                    reason: "moving agent was not registered at its position",
                },
                other => other.into(),
            })?;
        entity.position = to;
        self.verify_move(id, from, to)
    }

    fn verify_move(&self, id: EntityId, from: Cell, to: Cell) -> Result<(), WorldError> {
        if from != to && self.cells.contains(from, id) {
            return Err(WorldError::GhostAgent {
                reason: "agent still registered at its previous cell",
            });
        }
        let count = self.cells.at(to).iter().filter(|k| **k == id).count();
        if count != 1 {
            return Err(WorldError::GhostAgent {
                reason: "agent must be registered exactly once at its new cell",
            });
        }
        Ok(())
    }

    /// Full consistency scan of the arena, the cell index, and the agent list.
    pub fn check_invariants(&self) -> Result<(), WorldError> {
        let mut agents_in_grid = 0;
        for (cell, keys) in self.cells.occupied() {
            for id in keys {
                let entity = self.entities.get(*id).ok_or(WorldError::GhostAgent {
                    reason: "grid references a removed entity",
                })?;
                if entity.position != cell {
                    return Err(WorldError::GhostAgent {
                        reason: "entity registered away from its position",
                    });
                }
                if entity.tag() == EntityTag::Agent {
                    agents_in_grid += 1;
                    if !self.agents.contains(id) {
                        return Err(WorldError::GhostAgent {
                            reason: "agent in the grid but not in the agent list",
                        });
                    }
                }
            }
        }
        if agents_in_grid != self.agents.len() || self.cells.len() != self.entities.len() {
            return Err(WorldError::GhostAgent {
                reason: "agent list and grid disagree",
            });
        }
        Ok(())
    }

    // ----- spawning ------------------------------------------------------

    /// Spawn an agent carrying `genome` at `cell`.
    pub fn spawn_agent(
        &mut self,
        genome: Genome,
        cell: Cell,
        heading: Heading,
    ) -> Result<EntityId, WorldError> {
        let mut rng = self.rng.clone();
        let spawned = self.spawn_agent_with(genome, cell, heading, &mut rng);
        self.rng = rng;
        spawned
    }

    pub(crate) fn spawn_agent_with<R: Rng>(
        &mut self,
        genome: Genome,
        cell: Cell,
        heading: Heading,
        rng: &mut R,
    ) -> Result<EntityId, WorldError> {
        let mut state = AgentState::new(genome, heading);
        if state.is_sick {
            state.steps_until_healthy = self.sickness_duration(rng);
        }
        self.place(Entity::agent(state, cell, self.tick))
    }

    pub(crate) fn sickness_duration<R: Rng>(&self, rng: &mut R) -> u32 {
        rng.random_range(self.config.sickness_min_steps..=self.config.sickness_max_steps)
    }

    // ----- queries -------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &GridLifeConfig {
        &self.config
    }

    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    /// Steps processed since construction.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub const fn step_count(&self) -> u64 {
        self.tick.0
    }

    /// Hour of the simulated day, 0-23.
    #[must_use]
    pub const fn time(&self) -> u8 {
        self.hour
    }

    /// Override the clock, e.g. to pin an agent's sleep phase in tests.
    pub fn set_time(&mut self, hour: u8) {
        self.hour = hour % 24;
    }

    #[must_use]
    pub fn is_daytime(&self) -> bool {
        (self.config.day_start_hour..self.config.night_start_hour).contains(&self.hour)
    }

    /// Borrow the world RNG mutably for deterministic sampling.
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn agent(&self, id: EntityId) -> Option<&AgentState> {
        self.entities.get(id).and_then(Entity::as_agent)
    }

    /// Mutable agent state. Position is not reachable from here; use [`World::move_agent`].
    #[must_use]
    pub fn agent_mut(&mut self, id: EntityId) -> Option<&mut AgentState> {
        self.entities.get_mut(id).and_then(Entity::as_agent_mut)
    }

    pub(crate) fn agent_with_cell(&self, id: EntityId) -> Result<(Cell, &AgentState), WorldError> {
        let entity = self.entities.get(id).ok_or(WorldError::UnknownEntity)?;
        let agent = entity.as_agent().ok_or(WorldError::NotAnAgent)?;
        Ok((entity.position, agent))
    }

    /// Live agent list in processing order.
    #[must_use]
    pub fn agents(&self) -> &[EntityId] {
        &self.agents
    }

    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn food(&self) -> &[EntityId] {
        &self.food
    }

    #[must_use]
    pub fn trees(&self) -> &[EntityId] {
        &self.trees
    }

    #[must_use]
    pub fn mushrooms(&self) -> &[EntityId] {
        &self.mushrooms
    }

    #[must_use]
    pub fn dead_agents(&self) -> &[DeadAgent] {
        &self.dead
    }

    #[must_use]
    pub fn eaten_food(&self) -> &[Meal] {
        &self.eaten_food
    }

    #[must_use]
    pub fn eaten_mushrooms(&self) -> &[Meal] {
        &self.eaten_mushrooms
    }

    /// Iterate over retained tick summaries.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Every entity in `cell`, in placement order.
    #[must_use]
    pub fn entities_at(&self, cell: Cell) -> &[EntityId] {
        self.cells.at(cell)
    }

    /// Entities in `cell` carrying `tag`.
    pub fn tagged_at(&self, cell: Cell, tag: EntityTag) -> impl Iterator<Item = EntityId> + '_ {
        self.cells
            .at(cell)
            .iter()
            .copied()
            .filter(move |id| self.entities.get(*id).is_some_and(|e| e.tag() == tag))
    }

    #[must_use]
    pub fn agents_at(&self, cell: Cell) -> Vec<EntityId> {
        self.tagged_at(cell, EntityTag::Agent).collect()
    }

    /// The food item in `cell`. Placement keeps this to at most one.
    #[must_use]
    pub fn food_at(&self, cell: Cell) -> Option<EntityId> {
        self.tagged_at(cell, EntityTag::Food).next()
    }

    #[must_use]
    pub fn trees_at(&self, cell: Cell) -> Vec<EntityId> {
        self.tagged_at(cell, EntityTag::Tree).collect()
    }

    #[must_use]
    pub fn mushrooms_at(&self, cell: Cell) -> Vec<EntityId> {
        self.tagged_at(cell, EntityTag::Mushroom).collect()
    }

    #[must_use]
    pub fn stones_at(&self, cell: Cell) -> Vec<EntityId> {
        self.tagged_at(cell, EntityTag::Stone).collect()
    }

    #[must_use]
    pub fn water_at(&self, cell: Cell) -> Vec<EntityId> {
        self.tagged_at(cell, EntityTag::Water).collect()
    }

    #[must_use]
    pub fn pits_at(&self, cell: Cell) -> Vec<EntityId> {
        self.tagged_at(cell, EntityTag::Pit).collect()
    }

    #[must_use]
    pub fn grass_at(&self, cell: Cell) -> Vec<EntityId> {
        self.tagged_at(cell, EntityTag::Grass).collect()
    }

    #[must_use]
    pub fn sand_at(&self, cell: Cell) -> Vec<EntityId> {
        self.tagged_at(cell, EntityTag::Sand).collect()
    }

    #[must_use]
    pub fn snow_at(&self, cell: Cell) -> Vec<EntityId> {
        self.tagged_at(cell, EntityTag::Snow).collect()
    }

    /// Live agents in `cell` other than `except`.
    pub(crate) fn other_agents_at(
        &self,
        cell: Cell,
        except: EntityId,
    ) -> impl Iterator<Item = (EntityId, &AgentState)> + '_ {
        self.cells.at(cell).iter().filter_map(move |id| {
            if *id == except {
                return None;
            }
            let agent = self.entities.get(*id)?.as_agent()?;
            (!agent.is_dead).then_some((*id, agent))
        })
    }

    /// First grown mushroom in `cell`.
    pub(crate) fn edible_mushroom_at(&self, cell: Cell) -> Option<EntityId> {
        self.tagged_at(cell, EntityTag::Mushroom).find(|id| {
            self.entities
                .get(*id)
                .and_then(Entity::as_mushroom)
                .is_some_and(MushroomState::is_edible)
        })
    }

    /// First fruiting tree in `cell`.
    pub(crate) fn fruiting_tree_at(&self, cell: Cell) -> Option<EntityId> {
        self.tagged_at(cell, EntityTag::Tree).find(|id| {
            self.entities
                .get(*id)
                .and_then(Entity::as_tree)
                .is_some_and(TreeState::is_fruiting)
        })
    }

    /// First stone, water or pit in `cell`.
    #[must_use]
    pub fn obstacle_at(&self, cell: Cell) -> Option<EntityTag> {
        self.cells
            .at(cell)
            .iter()
            .filter_map(|id| self.entities.get(*id))
            .map(Entity::tag)
            .find(|tag| tag.is_obstacle())
    }

    fn has_cosmetic(&self, cell: Cell) -> bool {
        self.cells
            .at(cell)
            .iter()
            .filter_map(|id| self.entities.get(*id))
            .any(|e| e.tag().is_cosmetic())
    }

    /// How the terrain in `cell` treats `agent`.
    #[must_use]
    pub fn hazard(&self, cell: Cell, agent: &AgentState) -> Hazard {
        let deadly = self
            .cells
            .at(cell)
            .iter()
            .filter_map(|id| self.entities.get(*id))
            .any(|e| e.tag().is_obstacle() && !agent.survives_on(e.tag()));
        match (deadly, agent.traits.fly) {
            (false, _) => Hazard::None,
            (true, true) => Hazard::Hover,
            (true, false) => Hazard::Lethal,
        }
    }

    /// Mean steps survived across every agent that ever lived in this world.
    #[must_use]
    pub fn mean_survival(&self) -> f64 {
        let dead: u64 = self.dead.iter().map(|d| d.lifespan).sum();
        let living: u64 = self
            .agents
            .iter()
            .filter_map(|id| self.entities.get(*id))
            .map(|e| self.tick.0.saturating_sub(e.spawned_at.0))
            .sum();
        let count = self.dead.len() + self.agents.len();
        if count == 0 {
            return 0.0;
        }
        (dead + living) as f64 / count as f64
    }
}

pub(crate) fn random_heading<R: Rng>(rng: &mut R) -> Heading {
    Heading::CLOCKWISE[rng.random_range(0..Heading::CLOCKWISE.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALKER: &str = "21101345000009";

    fn genome(s: &str) -> Genome {
        s.parse().expect("genome")
    }

    fn empty_world(rows: u32, cols: u32) -> World {
        World::new(GridLifeConfig::empty(rows, cols)).expect("world")
    }

    #[test]
    fn populated_world_respects_placement_rules() {
        let config = GridLifeConfig {
            rng_seed: Some(17),
            ..GridLifeConfig::default()
        };
        let world = World::new(config).expect("world");
        assert_eq!(world.agent_count(), 30);
        assert!(!world.trees().is_empty());
        assert!(!world.mushrooms().is_empty());
        world.check_invariants().expect("consistent");

        for id in world.agents() {
            let cell = world.entity(*id).expect("agent").position;
            assert_eq!(world.obstacle_at(cell), None);
        }
        for id in world.food() {
            let cell = world.entity(*id).expect("food").position;
            assert_eq!(world.tagged_at(cell, EntityTag::Food).count(), 1);
        }
    }

    #[test]
    fn second_food_in_a_cell_is_rejected() {
        let mut world = empty_world(4, 4);
        let cell = Cell::new(1, 1);
        world
            .place(Entity::new(EntityKind::Food, cell, Tick::zero()))
            .expect("first food");
        let err = world
            .place(Entity::new(EntityKind::Food, cell, Tick::zero()))
            .expect_err("duplicate");
        assert_eq!(err, WorldError::DuplicateFood { row: 1, col: 1 });
        assert_eq!(world.food().len(), 1);
        assert!(world.food_at(cell).is_some());
    }

    #[test]
    fn kind_queries_filter_by_tag() {
        let mut world = empty_world(3, 3);
        let cell = Cell::new(2, 0);
        for kind in [EntityKind::Grass, EntityKind::Stone, EntityKind::Water] {
            world
                .place(Entity::new(kind, cell, Tick::zero()))
                .expect("place");
        }
        assert_eq!(world.entities_at(cell).len(), 3);
        assert_eq!(world.stones_at(cell).len(), 1);
        assert_eq!(world.water_at(cell).len(), 1);
        assert_eq!(world.grass_at(cell).len(), 1);
        assert!(world.sand_at(cell).is_empty());
        assert_eq!(world.obstacle_at(cell), Some(EntityTag::Stone));
    }

    #[test]
    fn move_agent_updates_grid_and_position() {
        let mut world = empty_world(5, 5);
        let id = world
            .spawn_agent(genome(WALKER), Cell::new(0, 0), Heading::North)
            .expect("spawn");
        world.move_agent(id, Cell::new(4, 0)).expect("move");
        assert_eq!(world.entity(id).expect("agent").position, Cell::new(4, 0));
        assert!(world.agents_at(Cell::new(0, 0)).is_empty());
        assert_eq!(world.agents_at(Cell::new(4, 0)), vec![id]);
        world.check_invariants().expect("consistent");
    }

    #[test]
    fn ghost_agents_are_detected() {
        let mut world = empty_world(5, 5);
        let id = world
            .spawn_agent(genome(WALKER), Cell::new(2, 2), Heading::East)
            .expect("spawn");
        // Desynchronize the index behind the world's back.
        world.cells.remove(Cell::new(2, 2), id).expect("detach");
        world.cells.insert(Cell::new(3, 3), id).expect("reattach");

        assert!(matches!(
            world.check_invariants(),
            Err(WorldError::GhostAgent { .. })
        ));
        assert!(matches!(
            world.move_agent(id, Cell::new(2, 3)),
            Err(WorldError::GhostAgent { .. })
        ));
    }

    #[test]
    fn remove_clears_every_index() {
        let mut world = empty_world(4, 4);
        let id = world
            .spawn_agent(genome(WALKER), Cell::new(1, 2), Heading::South)
            .expect("spawn");
        let removed = world.remove(id).expect("remove");
        assert_eq!(removed.position, Cell::new(1, 2));
        assert!(world.agents().is_empty());
        assert!(world.entities_at(Cell::new(1, 2)).is_empty());
        assert!(world.entity(id).is_none());
        assert_eq!(world.remove(id).expect_err("gone"), WorldError::UnknownEntity);
    }

    #[test]
    fn hazard_depends_on_locomotion() {
        let mut world = empty_world(3, 3);
        let cell = Cell::new(0, 0);
        world
            .place(Entity::new(EntityKind::Water, cell, Tick::zero()))
            .expect("water");
        let walker = AgentState::new(genome(WALKER), Heading::North);
        let swimmer = AgentState::new(genome("21101345010009"), Heading::North);
        let flyer = AgentState::new(genome("21101345001009"), Heading::North);
        assert_eq!(world.hazard(cell, &walker), Hazard::Lethal);
        assert_eq!(world.hazard(cell, &swimmer), Hazard::None);
        assert_eq!(world.hazard(cell, &flyer), Hazard::Hover);
        assert_eq!(world.hazard(Cell::new(1, 1), &walker), Hazard::None);
    }
}
