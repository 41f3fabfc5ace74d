//! Everything that can occupy a grid cell.

use crate::Tick;
use crate::genome::{AgentTraits, Genome};
use gridlife_index::{Cell, Heading};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Stable handle for entities backed by a generational slot map.
    pub struct EntityId;
}

/// Opaque handle owned by the rendering layer. The engine stores it and never reads it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VisualHandle(pub u64);

/// Payload-free entity tag used for filtering cell contents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntityTag {
    Agent,
    Food,
    Tree,
    Mushroom,
    Stone,
    Water,
    Pit,
    Grass,
    Sand,
    Snow,
}

impl EntityTag {
    /// Terrain that only exists for display.
    #[must_use]
    pub const fn is_cosmetic(self) -> bool {
        matches!(self, Self::Grass | Self::Sand | Self::Snow)
    }

    /// Static terrain that affects locomotion.
    #[must_use]
    pub const fn is_obstacle(self) -> bool {
        matches!(self, Self::Stone | Self::Water | Self::Pit)
    }
}

/// Fruit phase of a tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TreeFruit {
    Sprouting = -1,
    #[default]
    Barren = 0,
    Fruiting = 1,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeState {
    pub fruit: TreeFruit,
    pub steps_until_bloom: u32,
    /// Set when the fruit phase changed during the current step.
    pub just_changed: bool,
}

impl TreeState {
    #[must_use]
    pub const fn new(fruit: TreeFruit, steps_until_bloom: u32) -> Self {
        Self {
            fruit,
            steps_until_bloom,
            just_changed: false,
        }
    }

    #[must_use]
    pub const fn is_fruiting(&self) -> bool {
        matches!(self.fruit, TreeFruit::Fruiting)
    }
}

/// Behavioural effect of a mushroom, doubling as an agent's current influence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
pub enum MushroomKind {
    #[default]
    Neutral = 0,
    Sickness = 1,
    Paralysis = 2,
    Confusion = 3,
    Drain = 4,
}

impl MushroomKind {
    pub const ALL: [MushroomKind; 5] = [
        Self::Neutral,
        Self::Sickness,
        Self::Paralysis,
        Self::Confusion,
        Self::Drain,
    ];
}

/// Growth stage of a mushroom patch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Dropping {
    #[default]
    Spores = 0,
    Mushroom = 1,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MushroomState {
    pub kind: MushroomKind,
    pub dropping: Dropping,
    pub steps_until_grown: u32,
}

impl MushroomState {
    #[must_use]
    pub const fn is_edible(&self) -> bool {
        matches!(self.dropping, Dropping::Mushroom)
    }
}

/// The last thing an agent ate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Consumed {
    Food,
    Berries,
    Mushroom(MushroomKind),
    Prey,
}

/// Why an agent was reaped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeathCause {
    /// Stood on terrain it cannot survive.
    Terrain,
    /// Lost the sickness roll.
    Sickness,
    /// Killed by an attacker.
    Predation,
    /// Energy ran out.
    Starvation,
}

/// Mutable runtime state of a living agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub genome: Genome,
    pub traits: AgentTraits,
    pub heading: Heading,
    pub energy: i32,
    pub is_dead: bool,
    pub ready_to_breed: u32,
    /// Step in which the agent last took part in a birth.
    pub bred_at: Option<Tick>,
    pub is_sick: bool,
    pub steps_until_healthy: u32,
    pub mushroom_influence: MushroomKind,
    pub steps_until_no_mushroom_influence: u32,
    pub object_consumed: Option<Consumed>,
    pub cause_of_death: Option<DeathCause>,
}

impl AgentState {
    /// Fresh agent state with energy and sickness taken from the genome.
    #[must_use]
    pub fn new(genome: Genome, heading: Heading) -> Self {
        let traits = genome.traits();
        Self {
            genome,
            traits,
            heading,
            energy: traits.initial_energy,
            is_dead: false,
            ready_to_breed: 0,
            bred_at: None,
            is_sick: traits.sick,
            steps_until_healthy: 0,
            mushroom_influence: MushroomKind::Neutral,
            steps_until_no_mushroom_influence: 0,
            object_consumed: None,
            cause_of_death: None,
        }
    }

    /// Friendliness is shared color.
    #[must_use]
    pub const fn is_friend(&self, other: &AgentState) -> bool {
        self.traits.color == other.traits.color
    }

    /// Whether the agent can stand on a cell tagged `tag` without dying.
    #[must_use]
    pub const fn survives_on(&self, tag: EntityTag) -> bool {
        match tag {
            EntityTag::Water => self.traits.swim,
            EntityTag::Stone => self.traits.jump,
            EntityTag::Pit => false,
            _ => true,
        }
    }

    /// Whether the agent may step onto a cell tagged `tag`.
    #[must_use]
    pub const fn can_cross(&self, tag: EntityTag) -> bool {
        self.traits.fly || self.survives_on(tag)
    }
}

/// Per-variant payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EntityKind {
    Agent(Box<AgentState>),
    Food,
    Tree(TreeState),
    Mushroom(MushroomState),
    Stone,
    Water,
    Pit,
    Grass,
    Sand,
    Snow,
}

impl EntityKind {
    #[must_use]
    pub const fn tag(&self) -> EntityTag {
        match self {
            Self::Agent(_) => EntityTag::Agent,
            Self::Food => EntityTag::Food,
            Self::Tree(_) => EntityTag::Tree,
            Self::Mushroom(_) => EntityTag::Mushroom,
            Self::Stone => EntityTag::Stone,
            Self::Water => EntityTag::Water,
            Self::Pit => EntityTag::Pit,
            Self::Grass => EntityTag::Grass,
            Self::Sand => EntityTag::Sand,
            Self::Snow => EntityTag::Snow,
        }
    }
}

/// A thing occupying one grid cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub position: Cell,
    pub spawned_at: Tick,
    pub color: u8,
    pub visual: Option<VisualHandle>,
    pub kind: EntityKind,
}

impl Entity {
    /// Build a non-agent entity. Agents go through [`Entity::agent`].
    #[must_use]
    pub fn new(kind: EntityKind, position: Cell, spawned_at: Tick) -> Self {
        Self {
            position,
            spawned_at,
            color: 0,
            visual: None,
            kind,
        }
    }

    #[must_use]
    pub fn agent(state: AgentState, position: Cell, spawned_at: Tick) -> Self {
        Self {
            position,
            spawned_at,
            color: state.traits.color,
            visual: None,
            kind: EntityKind::Agent(Box::new(state)),
        }
    }

    #[must_use]
    pub const fn tag(&self) -> EntityTag {
        self.kind.tag()
    }

    #[must_use]
    pub fn as_agent(&self) -> Option<&AgentState> {
        match &self.kind {
            EntityKind::Agent(agent) => Some(&**agent),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_agent_mut(&mut self) -> Option<&mut AgentState> {
        match &mut self.kind {
            EntityKind::Agent(agent) => Some(&mut **agent),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_tree(&self) -> Option<&TreeState> {
        match &self.kind {
            EntityKind::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_tree_mut(&mut self) -> Option<&mut TreeState> {
        match &mut self.kind {
            EntityKind::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mushroom(&self) -> Option<&MushroomState> {
        match &self.kind {
            EntityKind::Mushroom(mushroom) => Some(mushroom),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mushroom_mut(&mut self) -> Option<&mut MushroomState> {
        match &mut self.kind {
            EntityKind::Mushroom(mushroom) => Some(mushroom),
            _ => None,
        }
    }
}
