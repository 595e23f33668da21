//! Persistent-world game core: lazy terrain, monster population, combat,
//! quests and the neighbourhood view, all backed by one sled store.

pub mod combat;
pub mod engine;
pub mod errors;
pub mod grid;
pub mod pokedex;
pub mod population;
pub mod quest;
pub mod rules;
pub mod seed;
pub mod storage;
pub mod sweep;
pub mod terrain;
pub mod types;

pub use combat::{CombatOutcome, CombatResult};
pub use engine::{GameEngine, MoveOutcome, WorldStatus};
pub use errors::WorldError;
pub use pokedex::{PokedexEntry, PokedexFilter, PokedexPage};
pub use population::{PopulationManager, SpawnReport};
pub use quest::{QuestProgress, SweepSummary};
pub use rules::WorldRules;
pub use storage::{WorldStore, WorldStoreBuilder};
pub use sweep::{QuestSweeper, SweepStats};
pub use types::{
    CharacterRecord, HuntedRecord, MonsterInstance, MonsterSummary, MonsterTemplate,
    NeighborhoodView, QuestGoal, QuestKind, QuestRecord, TerrainKind, TileRecord, TileView,
};
