//! Request-level facade over the world store and game engines.
//!
//! Every call draws from its own freshly seeded RNG, so concurrent requests
//! never share random state.

use std::path::Path;
use std::sync::Arc;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::logutil::{log_name, fmt_pos};
use crate::validation::{validate_coordinates, validate_identifier, MAX_NAME_LENGTH};
use crate::world::combat::{execute_combat, simulate_combat, CombatResult};
use crate::world::errors::WorldError;
use crate::world::grid::neighborhood_view;
use crate::world::pokedex::{pokedex, PokedexFilter, PokedexPage};
use crate::world::population::{PopulationManager, SpawnReport};
use crate::world::quest::{self, QuestProgress, SweepSummary};
use crate::world::rules::WorldRules;
use crate::world::storage::{WorldStore, WorldStoreBuilder};
use crate::world::terrain::{get_or_create_tile, materialize_tile};
use crate::world::types::{
    CharacterRecord, MonsterInstance, MonsterTemplate, NeighborhoodView, QuestRecord, TerrainKind,
    TileRecord,
};

/// Result of moving a character.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub character: CharacterRecord,
    pub tile: TileRecord,
    /// True when the destination was discovered by this move.
    pub discovered: bool,
    /// Monster that appeared on the freshly discovered tile.
    pub spawned: Option<MonsterInstance>,
    pub quests: QuestProgress,
}

/// Record counts for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldStatus {
    pub tiles: usize,
    pub monsters: usize,
    pub max_monsters: usize,
    pub templates: usize,
    pub characters: usize,
    pub deaths_since_regen: u64,
}

pub struct GameEngine {
    store: Arc<WorldStore>,
    rules: WorldRules,
    population: PopulationManager,
}

impl GameEngine {
    pub fn new(store: Arc<WorldStore>, rules: WorldRules) -> Self {
        let population = PopulationManager::new(store.clone(), rules.clone());
        Self {
            store,
            rules,
            population,
        }
    }

    /// Validate `rules` and open the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, rules: WorldRules) -> Result<Self, WorldError> {
        rules.validate()?;
        let store = WorldStoreBuilder::new(path.as_ref())
            .with_town_center(rules.town_center_x, rules.town_center_y)
            .open()?;
        Ok(Self::new(Arc::new(store), rules))
    }

    pub fn store(&self) -> &Arc<WorldStore> {
        &self.store
    }

    pub fn rules(&self) -> &WorldRules {
        &self.rules
    }

    pub fn population(&self) -> &PopulationManager {
        &self.population
    }

    fn rng() -> StdRng {
        StdRng::from_entropy()
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Result<TileRecord, WorldError> {
        get_or_create_tile(&self.store, &self.rules, &mut Self::rng(), x, y)
    }

    pub fn neighborhood(&self, x: i32, y: i32) -> Result<NeighborhoodView, WorldError> {
        neighborhood_view(&self.store, &self.rules, &mut Self::rng(), x, y)
    }

    pub fn monster_at(&self, x: i32, y: i32) -> Result<Option<MonsterInstance>, WorldError> {
        validate_coordinates(x, y, self.rules.world_size)?;
        self.population.get_by_position(x, y)
    }

    pub fn simulate_combat(&self, character_id: u64, x: i32, y: i32) -> Result<CombatResult, WorldError> {
        validate_coordinates(x, y, self.rules.world_size)?;
        simulate_combat(&self.store, &mut Self::rng(), character_id, x, y)
    }

    pub fn execute_combat(&self, character_id: u64, x: i32, y: i32) -> Result<CombatResult, WorldError> {
        validate_coordinates(x, y, self.rules.world_size)?;
        execute_combat(&self.store, &self.population, &mut Self::rng(), character_id, x, y)
    }

    /// Make sure at least `target` monsters exist, within the cap.
    pub fn ensure_monsters(&self, target: usize) -> Result<SpawnReport, WorldError> {
        self.population.ensure_population(&mut Self::rng(), target)
    }

    /// Remove a monster outside of combat (admin tooling).
    pub fn remove_monster(&self, x: i32, y: i32) -> Result<bool, WorldError> {
        validate_coordinates(x, y, self.rules.world_size)?;
        Ok(self.population.remove(&mut Self::rng(), x, y)?.removed)
    }

    pub fn active_quests(&self, character_id: u64) -> Result<Vec<QuestRecord>, WorldError> {
        quest::active_quests(&self.store, &self.rules, &mut Self::rng(), character_id)
    }

    pub fn notify_tile_reached(&self, character_id: u64, x: i32, y: i32) -> Result<QuestProgress, WorldError> {
        quest::notify_tile_reached(&self.store, &self.rules, &mut Self::rng(), character_id, x, y)
    }

    pub fn notify_monster_killed(
        &self,
        character_id: u64,
        template_id: u32,
    ) -> Result<QuestProgress, WorldError> {
        quest::notify_monster_killed(&self.store, &self.rules, &mut Self::rng(), character_id, template_id)
    }

    pub fn notify_level_changed(&self, character_id: u64) -> Result<QuestProgress, WorldError> {
        quest::notify_level_changed(&self.store, &self.rules, &mut Self::rng(), character_id)
    }

    /// Create the single character of `owner`, starting in the town center.
    pub fn create_character(&self, owner: &str, name: &str) -> Result<CharacterRecord, WorldError> {
        let owner = validate_identifier("player", owner, MAX_NAME_LENGTH)?;
        let name = validate_identifier("character name", name, MAX_NAME_LENGTH)?;
        let character = CharacterRecord::new(self.store.next_id()?, &owner, &name, self.rules.town_center());
        self.store.create_character(&character)?;
        quest::ensure_quest_floor(&self.store, &self.rules, &mut Self::rng(), &character)?;
        info!(
            "Created character {} '{}' at {}",
            character.id,
            log_name(&character.name),
            fmt_pos(character.x, character.y)
        );
        Ok(character)
    }

    pub fn find_character(&self, owner: &str) -> Result<Option<CharacterRecord>, WorldError> {
        self.store.find_character_by_owner(owner.trim())
    }

    /// Move a character to `(x, y)`.
    ///
    /// The destination is generated if needed and may receive a monster when
    /// it is discovered. Terrain does not block movement.
    pub fn move_character(&self, character_id: u64, x: i32, y: i32) -> Result<MoveOutcome, WorldError> {
        validate_coordinates(x, y, self.rules.world_size)?;
        let mut rng = Self::rng();
        let mut character = self.store.get_character(character_id)?;

        let lookup = materialize_tile(&self.store, &self.rules, &mut rng, x, y, &TerrainKind::ALL)?;
        character.x = x;
        character.y = y;
        self.store.put_character(&character)?;

        let spawned = if lookup.generated {
            self.population.spawn_on_discovery(&mut rng, &lookup.tile)?
        } else {
            None
        };
        let quests = quest::notify_tile_reached(&self.store, &self.rules, &mut rng, character_id, x, y)?;

        Ok(MoveOutcome {
            character,
            tile: lookup.tile,
            discovered: lookup.generated,
            spawned,
            quests,
        })
    }

    pub fn pokedex(&self, player: &str, filter: &PokedexFilter) -> Result<PokedexPage, WorldError> {
        pokedex(&self.store, player, filter)
    }

    /// Load templates into the catalog, overwriting entries with the same id.
    pub fn seed_catalog(&self, templates: &[MonsterTemplate]) -> Result<usize, WorldError> {
        self.store.seed_templates(templates)
    }

    /// Clear the map and its monsters. Characters and quests survive.
    pub fn reset_world(&self) -> Result<(), WorldError> {
        self.store.reset_world()
    }

    pub fn sweep_quests(&self) -> Result<SweepSummary, WorldError> {
        quest::sweep_all(&self.store, &self.rules, &mut Self::rng())
    }

    pub fn status(&self) -> Result<WorldStatus, WorldError> {
        Ok(WorldStatus {
            tiles: self.store.count_tiles(),
            monsters: self.store.count_monsters(),
            max_monsters: self.rules.max_monsters,
            templates: self.store.list_templates()?.len(),
            characters: self.store.list_character_ids()?.len(),
            deaths_since_regen: self.store.deaths_since_regen()?,
        })
    }
}
