use crate::WorldError;
use crate::genome::Genome;
use gridlife_index::GridDims;
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

/// Static configuration for a GridLife world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridLifeConfig {
    /// Number of grid rows.
    pub rows: u32,
    /// Number of grid columns.
    pub cols: u32,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Agents created at world construction.
    pub initial_agents: usize,
    /// Genetic strings assigned to initial agents, cycled in order.
    pub genomes: Vec<String>,
    /// Loose food items scattered at construction.
    pub food: usize,
    pub stones: usize,
    pub pits: usize,
    /// Number of water clusters.
    pub lakes: usize,
    /// Water cells attempted per lake.
    pub water_per_lake: usize,
    pub tree_clusters: usize,
    pub trees_per_cluster: usize,
    pub mushroom_clusters: usize,
    pub mushrooms_per_cluster: usize,
    /// Maximum row/column distance of a clustered entity from its cluster centre.
    pub cluster_radius: u32,
    pub grass: usize,
    pub sand: usize,
    pub snow: usize,
    /// Clock hour (0-23) the world starts at.
    pub start_hour: u8,
    /// First daylight hour.
    pub day_start_hour: u8,
    /// First night hour.
    pub night_start_hour: u8,
    /// Countdown assigned to both parents (and the child) after a birth.
    pub breed_cooldown: u32,
    /// Steps a barren tree waits before sprouting.
    pub tree_bloom_steps: u32,
    /// Steps a sprouting tree waits before fruiting.
    pub tree_sprout_steps: u32,
    /// Steps spores take to become an edible mushroom.
    pub mushroom_growth_steps: u32,
    /// Duration of a mushroom's behavioural influence.
    pub mushroom_influence_steps: u32,
    /// Shortest sickness, in steps.
    pub sickness_min_steps: u32,
    /// Longest sickness, in steps.
    pub sickness_max_steps: u32,
    /// Energy gained from one food item.
    pub food_energy: i32,
    /// Energy gained from a neutral mushroom.
    pub mushroom_energy: i32,
    /// Energy lost per step under a draining mushroom.
    pub mushroom_drain: i32,
    /// Energy a flyer loses per step spent over water, stone or a pit.
    pub flight_penalty: i32,
    /// Agents below this energy chase food and eat berries.
    pub hunger_threshold: i32,
    /// Agents below this energy rest when nothing else demands attention.
    pub rest_threshold: i32,
    /// Energy an attack removes from the defender.
    pub attack_damage: i32,
    /// Step budget for a single evaluation run.
    pub max_steps: u64,
    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
}

impl Default for GridLifeConfig {
    fn default() -> Self {
        Self {
            rows: 40,
            cols: 40,
            rng_seed: None,
            initial_agents: 30,
            genomes: vec![
                "21101380011005".to_string(),
                "31100460101103".to_string(),
                "12111770000107".to_string(),
            ],
            food: 120,
            stones: 40,
            pits: 10,
            lakes: 3,
            water_per_lake: 12,
            tree_clusters: 4,
            trees_per_cluster: 8,
            mushroom_clusters: 3,
            mushrooms_per_cluster: 5,
            cluster_radius: 3,
            grass: 300,
            sand: 60,
            snow: 40,
            start_hour: 8,
            day_start_hour: 6,
            night_start_hour: 20,
            breed_cooldown: 24,
            tree_bloom_steps: 18,
            tree_sprout_steps: 6,
            mushroom_growth_steps: 12,
            mushroom_influence_steps: 5,
            sickness_min_steps: 5,
            sickness_max_steps: 20,
            food_energy: 20,
            mushroom_energy: 10,
            mushroom_drain: 3,
            flight_penalty: 3,
            hunger_threshold: 50,
            rest_threshold: 25,
            attack_damage: 100,
            max_steps: 1_000,
            history_capacity: 256,
        }
    }
}

impl GridLifeConfig {
    /// An empty world of the given size: no terrain, no food, no agents.
    #[must_use]
    pub fn empty(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            rng_seed: Some(0),
            initial_agents: 0,
            genomes: Vec::new(),
            food: 0,
            stones: 0,
            pits: 0,
            lakes: 0,
            water_per_lake: 0,
            tree_clusters: 0,
            trees_per_cluster: 0,
            mushroom_clusters: 0,
            mushrooms_per_cluster: 0,
            grass: 0,
            sand: 0,
            snow: 0,
            ..Self::default()
        }
    }

    /// Validate the configuration, returning grid dimensions and parsed genomes.
    pub fn validate(&self) -> Result<(GridDims, Vec<Genome>), WorldError> {
        let dims = GridDims::new(self.rows, self.cols)?;
        if self.start_hour > 23 || self.day_start_hour > 23 || self.night_start_hour > 23 {
            return Err(WorldError::InvalidConfig("clock hours must be within 0-23"));
        }
        if self.day_start_hour >= self.night_start_hour {
            return Err(WorldError::InvalidConfig(
                "day_start_hour must precede night_start_hour",
            ));
        }
        if self.sickness_min_steps == 0 || self.sickness_min_steps > self.sickness_max_steps {
            return Err(WorldError::InvalidConfig(
                "sickness range must be non-empty and start above zero",
            ));
        }
        if self.tree_bloom_steps == 0
            || self.tree_sprout_steps == 0
            || self.mushroom_growth_steps == 0
            || self.mushroom_influence_steps == 0
        {
            return Err(WorldError::InvalidConfig(
                "growth and influence timers must be positive",
            ));
        }
        if self.food_energy < 0
            || self.mushroom_energy < 0
            || self.mushroom_drain < 0
            || self.flight_penalty < 0
            || self.attack_damage < 0
        {
            return Err(WorldError::InvalidConfig(
                "energy amounts must be non-negative",
            ));
        }
        if self.history_capacity == 0 {
            return Err(WorldError::InvalidConfig("history_capacity must be positive"));
        }
        if self.initial_agents > 0 && self.genomes.is_empty() {
            return Err(WorldError::InvalidConfig(
                "initial agents require at least one genome",
            ));
        }
        let genomes = self
            .genomes
            .iter()
            .map(|g| g.parse::<Genome>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok((dims, genomes))
    }

    /// Returns the configured RNG, generating a seed from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenomeError;

    #[test]
    fn default_config_is_valid() {
        let (dims, genomes) = GridLifeConfig::default().validate().expect("valid");
        assert_eq!(dims.rows, 40);
        assert_eq!(genomes.len(), 3);
    }

    #[test]
    fn rejects_bad_values() {
        let config = GridLifeConfig {
            rows: 0,
            ..GridLifeConfig::default()
        };
        assert!(matches!(config.validate(), Err(WorldError::Index(_))));

        let config = GridLifeConfig {
            day_start_hour: 20,
            night_start_hour: 6,
            ..GridLifeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WorldError::InvalidConfig(_))
        ));

        let config = GridLifeConfig {
            genomes: vec!["12".to_string()],
            ..GridLifeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WorldError::Genome(GenomeError::WrongLength { .. }))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: GridLifeConfig =
            serde_json::from_str(r#"{ "rows": 12, "cols": 9, "rng_seed": 5 }"#).expect("parse");
        assert_eq!(config.rows, 12);
        assert_eq!(config.cols, 9);
        assert_eq!(config.rng_seed, Some(5));
        assert_eq!(config.breed_cooldown, 24);
        assert_eq!(config.hunger_threshold, 50);
        assert!(config.validate().is_ok());
    }
}
