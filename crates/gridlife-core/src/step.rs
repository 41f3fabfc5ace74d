//! The per-tick update pipeline.

use crate::decision::{Action, base_energy_delta, decide};
use crate::entity::{
    AgentState, Consumed, DeathCause, Dropping, Entity, EntityId, EntityKind, MushroomKind,
    TreeFruit,
};
use crate::genome::Genome;
use crate::world::{DeadAgent, Hazard, Meal, World, random_heading};
use crate::{TickSummary, WorldError};
use gridlife_index::Heading;
use rand::Rng;
use tracing::{debug, trace};

/// Energy change that always kills.
pub const LETHAL_DELTA: i32 = -1000;

/// Probability that a sick agent dies on any energy change.
#[must_use]
pub fn sickness_death_chance(resistance: u8) -> f64 {
    (0.5 - f64::from(resistance) * 0.05).max(0.0)
}

/// Apply `delta` to `agent`, honouring sickness.
///
/// A sick agent first rolls against [`sickness_death_chance`]; a hit replaces
/// the change with [`LETHAL_DELTA`]. Otherwise a negative change is doubled.
/// If the agent ends at or below zero, `cause` is recorded unless a cause is
/// already set. Returns the change actually applied.
pub fn apply_energy_change<R: Rng>(
    agent: &mut AgentState,
    delta: i32,
    cause: DeathCause,
    rng: &mut R,
) -> i32 {
    let mut applied = delta;
    let mut cause = cause;
    if agent.is_sick {
        if rng.random::<f64>() < sickness_death_chance(agent.traits.resistance) {
            applied = LETHAL_DELTA;
            cause = DeathCause::Sickness;
        } else if applied < 0 {
            applied = applied.saturating_mul(2);
        }
    }
    agent.energy = agent.energy.saturating_add(applied);
    if agent.energy <= 0 && agent.cause_of_death.is_none() {
        agent.cause_of_death = Some(cause);
    }
    applied
}

impl World {
    /// Advance the simulation by one tick using the world RNG.
    ///
    /// Returns `Ok(false)` once no agents remain.
    pub fn step(&mut self) -> Result<bool, WorldError> {
        let mut rng = self.rng.clone();
        let result = self.step_with(&mut rng);
        self.rng = rng;
        result
    }

    /// Advance one tick drawing randomness from `rng`.
    pub fn step_with<R: Rng>(&mut self, rng: &mut R) -> Result<bool, WorldError> {
        if self.agents.is_empty() {
            return Ok(false);
        }
        self.tick = self.tick.next();
        self.hour = (self.hour + 1) % 24;
        self.births = 0;
        self.deaths = 0;

        self.stage_trees();
        self.stage_mushrooms();
        self.stage_agents(rng)?;
        self.stage_sweep()?;
        #[cfg(debug_assertions)]
        self.check_invariants()?;
        self.stage_summary();
        Ok(!self.agents.is_empty())
    }

    fn stage_trees(&mut self) {
        let sprout = self.config.tree_sprout_steps;
        for id in &self.trees {
            let Some(tree) = self.entities.get_mut(*id).and_then(Entity::as_tree_mut) else {
                continue;
            };
            tree.just_changed = false;
            match tree.fruit {
                TreeFruit::Fruiting => {}
                TreeFruit::Barren => {
                    tree.steps_until_bloom = tree.steps_until_bloom.saturating_sub(1);
                    if tree.steps_until_bloom == 0 {
                        tree.fruit = TreeFruit::Sprouting;
                        tree.steps_until_bloom = sprout;
                        tree.just_changed = true;
                    }
                }
                TreeFruit::Sprouting => {
                    tree.steps_until_bloom = tree.steps_until_bloom.saturating_sub(1);
                    if tree.steps_until_bloom == 0 {
                        tree.fruit = TreeFruit::Fruiting;
                        tree.just_changed = true;
                    }
                }
            }
        }
    }

    fn stage_mushrooms(&mut self) {
        for id in &self.mushrooms {
            let Some(mushroom) = self.entities.get_mut(*id).and_then(Entity::as_mushroom_mut)
            else {
                continue;
            };
            if mushroom.dropping == Dropping::Spores {
                mushroom.steps_until_grown = mushroom.steps_until_grown.saturating_sub(1);
                if mushroom.steps_until_grown == 0 {
                    mushroom.dropping = Dropping::Mushroom;
                }
            }
        }
    }

    fn stage_agents<R: Rng>(&mut self, rng: &mut R) -> Result<(), WorldError> {
        let mut index = 0;
        while index < self.agents.len() {
            let id = self.agents[index];
            let newborn = self
                .entities
                .get(id)
                .is_some_and(|e| e.spawned_at == self.tick);
            if newborn || self.update_agent(id, rng)? {
                index += 1;
            } else {
                self.reap(id)?;
            }
        }
        Ok(())
    }

    /// Run one agent's turn. Returns whether it survives.
    fn update_agent<R: Rng>(&mut self, id: EntityId, rng: &mut R) -> Result<bool, WorldError> {
        self.tick_timers(id, rng)?;
        let agent = self.agent_state(id)?;
        if agent.energy <= 0 {
            agent.is_dead = true;
        }
        if !agent.is_dead {
            self.catch_sickness(id, rng)?;
            let action = decide(self, id, rng)?;
            trace!(?id, ?action, "agent acts");
            self.apply_action(id, action, rng)?;

            let (cell, agent) = self.agent_with_cell(id)?;
            if self.hazard(cell, agent) == Hazard::Hover {
                let penalty = self.config.flight_penalty;
                let agent = self.agent_state(id)?;
                apply_energy_change(agent, -penalty, DeathCause::Terrain, rng);
            }

            let tick = self.tick;
            let agent = self.agent_state(id)?;
            if agent.bred_at != Some(tick) {
                agent.ready_to_breed = agent.ready_to_breed.saturating_sub(1);
            }
        }

        let agent = self.agent_state(id)?;
        if agent.energy <= 0 {
            agent.is_dead = true;
        }
        Ok(!agent.is_dead)
    }

    fn tick_timers<R: Rng>(&mut self, id: EntityId, rng: &mut R) -> Result<(), WorldError> {
        let drain = self.config.mushroom_drain;
        let agent = self.agent_state(id)?;
        if agent.is_sick {
            agent.steps_until_healthy = agent.steps_until_healthy.saturating_sub(1);
            if agent.steps_until_healthy == 0 {
                agent.is_sick = false;
            }
        }
        if agent.mushroom_influence != MushroomKind::Neutral {
            if agent.mushroom_influence == MushroomKind::Drain {
                apply_energy_change(agent, -drain, DeathCause::Starvation, rng);
            }
            agent.steps_until_no_mushroom_influence =
                agent.steps_until_no_mushroom_influence.saturating_sub(1);
            if agent.steps_until_no_mushroom_influence == 0 {
                agent.mushroom_influence = MushroomKind::Neutral;
            }
        }
        Ok(())
    }

    /// Contact with a sick cell-mate makes a healthy agent sick.
    fn catch_sickness<R: Rng>(&mut self, id: EntityId, rng: &mut R) -> Result<(), WorldError> {
        let (cell, agent) = self.agent_with_cell(id)?;
        if agent.is_sick || !self.other_agents_at(cell, id).any(|(_, o)| o.is_sick) {
            return Ok(());
        }
        let duration = self.sickness_duration(rng);
        let agent = self.agent_state(id)?;
        agent.is_sick = true;
        agent.steps_until_healthy = duration;
        trace!(?id, duration, "sickness transmitted");
        Ok(())
    }

    fn apply_action<R: Rng>(
        &mut self,
        id: EntityId,
        action: Action,
        rng: &mut R,
    ) -> Result<(), WorldError> {
        let mut delta = base_energy_delta(action);
        let mut cause = DeathCause::Starvation;
        match action {
            Action::Left => self.turn(id, |h| h.turn_left())?,
            Action::Right => self.turn(id, |h| h.turn_right())?,
            Action::TurnAround => self.turn(id, |h| h.reverse())?,
            Action::Forward => {
                let (cell, agent) = self.agent_with_cell(id)?;
                let to = self.dims.ahead(cell, agent.heading, 1);
                self.move_agent(id, to)?;
            }
            Action::Eat => delta += self.eat(id, rng)?,
            Action::EatBerries => {
                if !self.eat_berries(id)? {
                    delta = 0;
                }
            }
            Action::Breed => self.breed(id, rng)?,
            Action::Attack => {
                if !self.attack(id, rng)? {
                    delta = base_energy_delta(Action::Forward);
                }
            }
            Action::Die => cause = DeathCause::Terrain,
            Action::Roost | Action::Rest | Action::Pause => {}
        }
        let agent = self.agent_state(id)?;
        apply_energy_change(agent, delta, cause, rng);
        Ok(())
    }

    fn turn(
        &mut self,
        id: EntityId,
        rotate: impl FnOnce(Heading) -> Heading,
    ) -> Result<(), WorldError> {
        let agent = self.agent_state(id)?;
        agent.heading = rotate(agent.heading);
        Ok(())
    }

    /// Eat the food or grown mushroom in the agent's cell. Returns the energy gained.
    fn eat<R: Rng>(&mut self, id: EntityId, rng: &mut R) -> Result<i32, WorldError> {
        let (cell, _) = self.agent_with_cell(id)?;
        let tick = self.tick;

        if let Some(food) = self.food_at(cell) {
            self.remove(food)?;
            self.eaten_food.push(Meal {
                tick,
                cell,
                eater: id,
                mushroom: None,
            });
            self.agent_state(id)?.object_consumed = Some(Consumed::Food);
            return Ok(self.config.food_energy);
        }

        let Some(mushroom_id) = self.edible_mushroom_at(cell) else {
            return Ok(0);
        };
        let growth = self.config.mushroom_growth_steps;
        let kind = match self
            .entities
            .get_mut(mushroom_id)
            .and_then(Entity::as_mushroom_mut)
        {
            Some(mushroom) => {
                mushroom.dropping = Dropping::Spores;
                mushroom.steps_until_grown = growth;
                mushroom.kind
            }
            None => return Ok(0),
        };
        self.eaten_mushrooms.push(Meal {
            tick,
            cell,
            eater: id,
            mushroom: Some(kind),
        });

        let influence = self.config.mushroom_influence_steps;
        let energy = self.config.mushroom_energy;
        let sickness = self.sickness_duration(rng);
        let agent = self.agent_state(id)?;
        agent.object_consumed = Some(Consumed::Mushroom(kind));
        match kind {
            MushroomKind::Neutral => return Ok(energy),
            MushroomKind::Sickness => {
                if !agent.is_sick {
                    agent.is_sick = true;
                    agent.steps_until_healthy = sickness;
                }
            }
            MushroomKind::Paralysis | MushroomKind::Confusion | MushroomKind::Drain => {}
        }
        agent.mushroom_influence = kind;
        agent.steps_until_no_mushroom_influence = influence;
        trace!(?id, ?kind, "mushroom eaten");
        Ok(0)
    }

    /// Strip a fruiting tree in the agent's cell. Returns whether any fruit was eaten.
    fn eat_berries(&mut self, id: EntityId) -> Result<bool, WorldError> {
        let (cell, _) = self.agent_with_cell(id)?;
        let Some(tree_id) = self.fruiting_tree_at(cell) else {
            return Ok(false);
        };
        let bloom = self.config.tree_bloom_steps;
        if let Some(tree) = self.entities.get_mut(tree_id).and_then(Entity::as_tree_mut) {
            tree.fruit = TreeFruit::Barren;
            tree.steps_until_bloom = bloom;
            tree.just_changed = true;
        }
        self.agent_state(id)?.object_consumed = Some(Consumed::Berries);
        Ok(true)
    }

    /// Commit a birth with the first ready friend in the cell.
    fn breed<R: Rng>(&mut self, id: EntityId, rng: &mut R) -> Result<(), WorldError> {
        let (cell, agent) = self.agent_with_cell(id)?;
        if agent.ready_to_breed != 0 {
            return Ok(());
        }
        let Some((partner, partner_state)) = self
            .other_agents_at(cell, id)
            .find(|(_, other)| agent.is_friend(other) && other.ready_to_breed == 0)
        else {
            return Ok(());
        };
        let genome = Genome::crossover(&agent.genome, &partner_state.genome, rng);

        let tick = self.tick;
        let cooldown = self.config.breed_cooldown;
        for parent in [id, partner] {
            let state = self.agent_state(parent)?;
            state.ready_to_breed = cooldown;
            state.bred_at = Some(tick);
        }

        let heading = random_heading(rng);
        let child = self.spawn_agent_with(genome, cell, heading, rng)?;
        self.agent_state(child)?.ready_to_breed = cooldown;
        self.births += 1;
        debug!(?id, ?partner, ?child, %genome, "agent born");
        Ok(())
    }

    /// Strike the first live foe in the cell. Returns whether a target was hit.
    fn attack<R: Rng>(&mut self, id: EntityId, rng: &mut R) -> Result<bool, WorldError> {
        let (cell, agent) = self.agent_with_cell(id)?;
        let Some((target, _)) = self
            .other_agents_at(cell, id)
            .find(|(_, other)| !agent.is_friend(other))
        else {
            return Ok(false);
        };
        let damage = self.config.attack_damage;
        let defender = self.agent_state(target)?;
        apply_energy_change(defender, -damage, DeathCause::Predation, rng);
        if defender.energy <= 0 {
            defender.is_dead = true;
        }
        let killed = defender.is_dead;
        self.agent_state(id)?.object_consumed = Some(Consumed::Prey);
        trace!(?id, ?target, killed, "attack");
        Ok(true)
    }

    /// Reap agents killed during the tick that were already past in the agent list.
    fn stage_sweep(&mut self) -> Result<(), WorldError> {
        let fallen: Vec<EntityId> = self
            .agents
            .iter()
            .copied()
            .filter(|id| self.agent(*id).is_some_and(|a| a.is_dead || a.energy <= 0))
            .collect();
        for id in fallen {
            self.reap(id)?;
        }
        Ok(())
    }

    /// Remove a dead agent, log it, and drop food where it fell if it last ate food.
    fn reap(&mut self, id: EntityId) -> Result<(), WorldError> {
        let entity = self.remove(id)?;
        let cell = entity.position;
        let EntityKind::Agent(agent) = entity.kind else {
            return Err(WorldError::NotAnAgent);
        };
        let cause = agent.cause_of_death.unwrap_or(DeathCause::Starvation);
        let lifespan = self.tick.0.saturating_sub(entity.spawned_at.0);
        self.dead.push(DeadAgent {
            id,
            genome: agent.genome,
            color: entity.color,
            cell,
            born: entity.spawned_at,
            died: self.tick,
            lifespan,
            cause,
        });
        self.deaths += 1;

        let ate_food = matches!(
            agent.object_consumed,
            Some(Consumed::Food | Consumed::Berries)
        );
        if ate_food && self.food_at(cell).is_none() && self.obstacle_at(cell).is_none() {
            self.place(Entity::new(EntityKind::Food, cell, self.tick))?;
        }
        debug!(?id, ?cause, lifespan, genome = %agent.genome, "agent died");
        Ok(())
    }

    fn stage_summary(&mut self) {
        let total_energy: i64 = self
            .agents
            .iter()
            .filter_map(|id| self.agent(*id))
            .map(|a| i64::from(a.energy))
            .sum();
        let agent_count = self.agents.len();
        let average_energy = if agent_count == 0 {
            0.0
        } else {
            total_energy as f64 / agent_count as f64
        };
        let summary = TickSummary {
            tick: self.tick,
            hour: self.hour,
            agent_count,
            births: self.births,
            deaths: self.deaths,
            food_count: self.food.len(),
            total_energy,
            average_energy,
        };
        trace!(
            tick = summary.tick.0,
            agents = agent_count,
            births = summary.births,
            deaths = summary.deaths,
            "tick complete"
        );
        if self.history.len() == self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    fn agent_state(&mut self, id: EntityId) -> Result<&mut AgentState, WorldError> {
        self.entities
            .get_mut(id)
            .ok_or(WorldError::UnknownEntity)?
            .as_agent_mut()
            .ok_or(WorldError::NotAnAgent)
    }
}
