//! World constants, loaded from the `[world]` config section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::validation::{in_bounds, ValidationError};

/// Tunable world constants. Defaults match the canonical 50x50 world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldRules {
    /// Width and height of the square grid.
    #[serde(default = "default_world_size")]
    pub world_size: i32,
    /// Hard cap on live monster instances.
    #[serde(default = "default_max_monsters")]
    pub max_monsters: usize,
    /// Deaths that trigger one regeneration batch of the same size.
    #[serde(default = "default_regen_threshold")]
    pub regen_threshold: u64,
    #[serde(default = "default_town_center")]
    pub town_center_x: i32,
    #[serde(default = "default_town_center")]
    pub town_center_y: i32,
    /// Active quests every character is topped up to.
    #[serde(default = "default_active_quest_floor")]
    pub active_quest_floor: usize,
    #[serde(default = "default_quest_sweep_interval_minutes")]
    pub quest_sweep_interval_minutes: u64,
    /// Chance (percent) that a freshly discovered tile gets a monster.
    #[serde(default = "default_discovery_spawn_chance_percent")]
    pub discovery_spawn_chance_percent: u8,
}

fn default_world_size() -> i32 {
    50
}

fn default_max_monsters() -> usize {
    300
}

fn default_regen_threshold() -> u64 {
    10
}

fn default_town_center() -> i32 {
    10
}

fn default_active_quest_floor() -> usize {
    3
}

fn default_quest_sweep_interval_minutes() -> u64 {
    10
}

fn default_discovery_spawn_chance_percent() -> u8 {
    10
}

impl Default for WorldRules {
    fn default() -> Self {
        Self {
            world_size: default_world_size(),
            max_monsters: default_max_monsters(),
            regen_threshold: default_regen_threshold(),
            town_center_x: default_town_center(),
            town_center_y: default_town_center(),
            active_quest_floor: default_active_quest_floor(),
            quest_sweep_interval_minutes: default_quest_sweep_interval_minutes(),
            discovery_spawn_chance_percent: default_discovery_spawn_chance_percent(),
        }
    }
}

impl WorldRules {
    pub fn town_center(&self) -> (i32, i32) {
        (self.town_center_x, self.town_center_y)
    }

    pub fn is_town_center(&self, x: i32, y: i32) -> bool {
        (x, y) == self.town_center()
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        in_bounds(x, y, self.world_size)
    }

    /// Number of cells a monster could ever occupy (everything but the town center).
    pub fn spawnable_cells(&self) -> usize {
        let size = self.world_size.max(0) as usize;
        (size * size).saturating_sub(1)
    }

    pub fn quest_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.quest_sweep_interval_minutes * 60)
    }

    /// Reject rule sets the engines cannot honour.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.world_size <= 1 {
            return Err(ValidationError::InvalidRules(format!(
                "world_size must be at least 2, got {}",
                self.world_size
            )));
        }
        if !self.in_bounds(self.town_center_x, self.town_center_y) {
            return Err(ValidationError::InvalidRules(format!(
                "town center ({}, {}) lies outside the world",
                self.town_center_x, self.town_center_y
            )));
        }
        if self.max_monsters > self.spawnable_cells() {
            return Err(ValidationError::InvalidRules(format!(
                "max_monsters {} exceeds the {} spawnable cells",
                self.max_monsters,
                self.spawnable_cells()
            )));
        }
        if self.regen_threshold == 0 {
            return Err(ValidationError::InvalidRules(
                "regen_threshold must be positive".to_string(),
            ));
        }
        if self.quest_sweep_interval_minutes == 0 {
            return Err(ValidationError::InvalidRules(
                "quest_sweep_interval_minutes must be positive".to_string(),
            ));
        }
        if self.discovery_spawn_chance_percent > 100 {
            return Err(ValidationError::InvalidRules(format!(
                "discovery_spawn_chance_percent {} is above 100",
                self.discovery_spawn_chance_percent
            )));
        }
        Ok(())
    }
}
