// Integration test for the TOML configuration and the engine it opens

use gridrealm::config::Config;
use gridrealm::world::GameEngine;
use tempfile::tempdir;

#[test]
fn default_config_round_trips_through_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    tokio_test::block_on(Config::create_default(path)).unwrap();
    let config = tokio_test::block_on(Config::load(path)).unwrap();

    assert_eq!(config.world.world_size, 50);
    assert_eq!(config.world.town_center(), (10, 10));
    assert_eq!(config.world.active_quest_floor, 3);
}

#[test]
fn edited_world_section_drives_the_engine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let db = dir.path().join("world.db");
    std::fs::write(
        &path,
        format!(
            "[world]\nworld_size = 12\ntown_center_x = 4\ntown_center_y = 7\nmax_monsters = 30\n\n[storage]\ndb_path = {:?}\n",
            db.to_str().unwrap()
        ),
    )
    .unwrap();

    let config = tokio_test::block_on(Config::load(path.to_str().unwrap())).unwrap();
    let engine = GameEngine::open(config.storage.db_path(), config.world.clone()).unwrap();

    let center = engine.neighborhood(4, 7).unwrap();
    assert_eq!(center.at(0, 0).unwrap().terrain, "TOWN");
    assert!(engine.tile_at(12, 0).is_err());
    assert_eq!(engine.status().unwrap().max_monsters, 30);
}

#[test]
fn invalid_world_rules_are_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[world]\nworld_size = 5\nmax_monsters = 100\n").unwrap();

    let err = tokio_test::block_on(Config::load(path.to_str().unwrap())).unwrap_err();
    assert!(err.to_string().contains("[world]"));
}
