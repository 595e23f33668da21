//! Test utilities & fixtures shared by the integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gridrealm::world::{GameEngine, MonsterTemplate, WorldRules, WorldStore, WorldStoreBuilder};
use tempfile::TempDir;

/// Path to the monster seed file shipped with the crate.
#[allow(dead_code)] // not every test binary loads the seed file
pub fn seed_file() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("data")
        .join("seeds")
        .join("monsters.json")
}

/// Small deterministic catalog: one weak, one strong, one untyped species.
pub fn test_templates() -> Vec<MonsterTemplate> {
    vec![
        MonsterTemplate::new(1, "Rat", 10, 4, 1, 5).with_types("normal", ""),
        MonsterTemplate::new(2, "Ember", 12, 6, 2, 9).with_types("fire", "flying"),
        MonsterTemplate::new(3, "Golem", 500, 60, 40, 50).with_types("rock", "ground"),
    ]
}

/// Throwaway store honouring `rules`' town center, seeded with [`test_templates`].
#[allow(dead_code)]
pub fn store_with(rules: &WorldRules) -> (Arc<WorldStore>, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let store = WorldStoreBuilder::new(dir.path())
        .with_town_center(rules.town_center_x, rules.town_center_y)
        .open()
        .expect("store");
    store.seed_templates(&test_templates()).expect("seed");
    (Arc::new(store), dir)
}

/// Engine over a fresh store seeded with [`test_templates`].
#[allow(dead_code)]
pub fn engine_with(rules: WorldRules) -> (GameEngine, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let engine = GameEngine::open(dir.path(), rules).expect("engine");
    engine.seed_catalog(&test_templates()).expect("seed");
    (engine, dir)
}
