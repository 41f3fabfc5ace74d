//! Rule-based action selection.
//!
//! An agent starts every step with the candidate list
//! `[Left, Right, TurnAround, Forward, Forward, Forward]` and narrows it by
//! checking its own cell, then what it sees ahead, then what it smells around
//! it. The first check that settles the list wins.

use crate::WorldError;
use crate::entity::{AgentState, EntityId, EntityTag, MushroomKind};
use crate::genome::SleepPhase;
use crate::world::{Hazard, World};
use gridlife_index::{Cell, Relative};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Everything an agent can do in one step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    Left,
    Right,
    TurnAround,
    Forward,
    Eat,
    EatBerries,
    Breed,
    Attack,
    Roost,
    Rest,
    Pause,
    Die,
}

/// Energy change for an action before any food, prey, or sickness adjustment.
#[must_use]
pub const fn base_energy_delta(action: Action) -> i32 {
    match action {
        Action::Left | Action::Right | Action::TurnAround | Action::Forward | Action::Breed => -1,
        Action::Eat => 0,
        Action::EatBerries | Action::Rest => 2,
        Action::Attack => 50,
        Action::Roost => 10,
        Action::Pause => -5,
        Action::Die => -1000,
    }
}

impl Action {
    const fn toward(relative: Relative) -> Self {
        match relative {
            Relative::Front => Self::Forward,
            Relative::Back => Self::TurnAround,
            Relative::Right => Self::Right,
            Relative::Left => Self::Left,
        }
    }
}

const INITIAL: [Action; 6] = [
    Action::Left,
    Action::Right,
    Action::TurnAround,
    Action::Forward,
    Action::Forward,
    Action::Forward,
];

const TURNS: [Action; 3] = [Action::Left, Action::Right, Action::TurnAround];

fn pick<R: Rng>(actions: &[Action], rng: &mut R) -> Action {
    actions[rng.random_range(0..actions.len())]
}

/// Working candidate list.
struct Candidates {
    list: SmallVec<[Action; 6]>,
    touched: bool,
}

impl Candidates {
    fn new() -> Self {
        Self {
            list: SmallVec::from_slice(&INITIAL),
            touched: false,
        }
    }

    fn narrow(&mut self, action: Action) {
        self.list.clear();
        self.list.push(action);
        self.touched = true;
    }

    fn strike(&mut self, action: Action) {
        self.list.retain(|a| *a != action);
        self.touched = true;
    }

    /// A final answer once the list is empty or holds a single distinct action.
    fn settled<R: Rng>(&self, rng: &mut R) -> Option<Action> {
        match self.list.first() {
            None => Some(pick(&TURNS, rng)),
            Some(first) if self.list.iter().all(|a| a == first) => Some(*first),
            Some(_) => None,
        }
    }
}

/// What an agent notices in one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Percept {
    /// Terrain the agent cannot cross.
    Obstacle,
    Friend,
    Foe,
    Food,
}

struct Senses<'w> {
    world: &'w World,
    id: EntityId,
    cell: Cell,
    agent: &'w AgentState,
}

impl Senses<'_> {
    fn hungry(&self) -> bool {
        self.agent.energy < self.world.config.hunger_threshold
    }

    fn perceive(&self, cell: Cell) -> Option<Percept> {
        if let Some(tag) = self.world.obstacle_at(cell) {
            if !self.agent.can_cross(tag) {
                return Some(Percept::Obstacle);
            }
        }
        if let Some((_, other)) = self.world.other_agents_at(cell, self.id).next() {
            return Some(if self.agent.is_friend(other) {
                Percept::Friend
            } else {
                Percept::Foe
            });
        }
        if self.world.food_at(cell).is_some() || self.world.edible_mushroom_at(cell).is_some() {
            return Some(Percept::Food);
        }
        None
    }

    /// Shared friend, foe, and food rules for a percept lying in `direction`.
    fn react(&self, percept: Percept, direction: Action, candidates: &mut Candidates) {
        match percept {
            Percept::Friend => candidates.narrow(direction),
            Percept::Foe if self.agent.traits.aggressive => candidates.narrow(direction),
            Percept::Foe => candidates.strike(direction),
            Percept::Food if self.hungry() && !self.agent.traits.aggressive => {
                candidates.narrow(direction);
            }
            Percept::Food | Percept::Obstacle => {}
        }
    }
}

/// Whether `agent` is asleep at the world's current hour.
#[must_use]
pub fn is_asleep(world: &World, agent: &AgentState) -> bool {
    match agent.traits.sleep {
        SleepPhase::Diurnal => !world.is_daytime(),
        SleepPhase::Nocturnal => world.is_daytime(),
    }
}

/// Choose the action agent `id` takes this step.
pub fn decide<R: Rng>(world: &World, id: EntityId, rng: &mut R) -> Result<Action, WorldError> {
    let (cell, agent) = world.agent_with_cell(id)?;
    match agent.mushroom_influence {
        MushroomKind::Paralysis => return Ok(Action::Pause),
        MushroomKind::Confusion => return Ok(pick(&INITIAL, rng)),
        _ => {}
    }
    if is_asleep(world, agent) {
        return Ok(Action::Rest);
    }

    let senses = Senses {
        world,
        id,
        cell,
        agent,
    };
    if let Some(action) = check_here(&senses) {
        return Ok(action);
    }

    let mut candidates = Candidates::new();
    check_vision(&senses, &mut candidates);
    if let Some(action) = candidates.settled(rng) {
        return Ok(action);
    }
    if let Some(action) = check_smell(&senses, &mut candidates, rng) {
        return Ok(action);
    }

    if !candidates.touched && agent.energy < world.config.rest_threshold {
        let perched = agent.traits.fly && !world.trees_at(cell).is_empty();
        return Ok(if perched { Action::Roost } else { Action::Rest });
    }
    Ok(pick(&candidates.list, rng))
}

fn check_here(senses: &Senses<'_>) -> Option<Action> {
    let Senses {
        world, cell, agent, ..
    } = *senses;
    if world.hazard(cell, agent) == Hazard::Lethal {
        return Some(Action::Die);
    }

    let mut ready_friend = false;
    for (_, other) in world.other_agents_at(cell, senses.id) {
        if !agent.is_friend(other) {
            return Some(if agent.traits.aggressive {
                Action::Attack
            } else {
                Action::Forward
            });
        }
        ready_friend |= other.ready_to_breed == 0;
    }
    if ready_friend && agent.ready_to_breed == 0 {
        return Some(Action::Breed);
    }

    if !agent.traits.aggressive
        && (world.food_at(cell).is_some() || world.edible_mushroom_at(cell).is_some())
    {
        return Some(Action::Eat);
    }
    if agent.traits.scavenge && senses.hungry() && world.fruiting_tree_at(cell).is_some() {
        return Some(Action::EatBerries);
    }
    None
}

/// Scan straight ahead. Trees block sight; cosmetic terrain does not.
fn check_vision(senses: &Senses<'_>, candidates: &mut Candidates) {
    let world = senses.world;
    for distance in 1..=i64::from(senses.agent.traits.vision) {
        let cell = world
            .dims
            .ahead(senses.cell, senses.agent.heading, distance);
        if world.tagged_at(cell, EntityTag::Tree).next().is_some() {
            return;
        }
        match senses.perceive(cell) {
            None => continue,
            Some(Percept::Obstacle) => {
                if distance == 1 {
                    candidates.strike(Action::Forward);
                }
                return;
            }
            Some(percept) => {
                senses.react(percept, Action::Forward, candidates);
                return;
            }
        }
    }
}

/// Smell the four neighbours, then at radius 2 the cells two away and the diagonals.
fn check_smell<R: Rng>(
    senses: &Senses<'_>,
    candidates: &mut Candidates,
    rng: &mut R,
) -> Option<Action> {
    let radius = senses.agent.traits.smell;
    if radius == 0 {
        return None;
    }
    let world = senses.world;
    let heading = senses.agent.heading;

    let reach: &[i64] = if radius >= 2 { &[1, 2] } else { &[1] };
    for &distance in reach {
        for relative in Relative::ALL {
            let cell = world
                .dims
                .ahead(senses.cell, heading.rotate(relative), distance);
            if let Some(percept) = senses.perceive(cell) {
                senses.react(percept, Action::toward(relative), candidates);
                if let Some(action) = candidates.settled(rng) {
                    return Some(action);
                }
            }
        }
    }

    if radius >= 2 {
        let diagonals = [
            (Relative::Front, Relative::Right),
            (Relative::Front, Relative::Left),
            (Relative::Back, Relative::Right),
            (Relative::Back, Relative::Left),
        ];
        for (vertical, lateral) in diagonals {
            let (dr, dc) = heading.rotate(vertical).delta();
            let (lr, lc) = heading.rotate(lateral).delta();
            let cell = world.dims.offset(senses.cell, dr + lr, dc + lc);
            if let Some(percept) = senses.perceive(cell) {
                let direction = if rng.random_bool(0.5) {
                    Action::toward(vertical)
                } else {
                    Action::toward(lateral)
                };
                senses.react(percept, direction, candidates);
                if let Some(action) = candidates.settled(rng) {
                    return Some(action);
                }
            }
        }
    }
    None
}
