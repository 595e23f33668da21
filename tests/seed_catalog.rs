/// The shipped monster seed file loads cleanly and drives a populated world
/// and a usable pokedex.
mod common;

use gridrealm::world::seed::load_templates_from_json;
use gridrealm::world::{GameEngine, PokedexFilter, WorldRules};
use tempfile::TempDir;

#[test]
fn shipped_seed_file_is_valid() {
    let templates = load_templates_from_json(common::seed_file()).expect("seed file parses");
    assert!(templates.len() >= 20);
    for template in &templates {
        assert!(template.base_hp > 0, "{} has no hp", template.name);
        assert!(!template.name.is_empty());
        assert!(!template.type1.is_empty(), "{} has no type", template.name);
    }
}

#[test]
fn seeded_world_supports_pokedex_browsing() {
    let dir = TempDir::new().unwrap();
    let engine = GameEngine::open(dir.path(), WorldRules::default()).unwrap();
    let templates = load_templates_from_json(common::seed_file()).unwrap();
    let seeded = engine.seed_catalog(&templates).unwrap();
    assert_eq!(seeded, templates.len());
    engine.create_character("oak", "Oak").unwrap();

    let first = engine
        .pokedex("oak", &PokedexFilter { limit: Some(5), ..PokedexFilter::default() })
        .unwrap();
    assert_eq!(first.items.len(), 5);
    assert_eq!(first.total, templates.len());
    let names: Vec<_> = first.items.iter().map(|e| e.name.clone()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);

    let second = engine
        .pokedex(
            "oak",
            &PokedexFilter { offset: 5, limit: Some(5), ..PokedexFilter::default() },
        )
        .unwrap();
    assert!(second.items.iter().all(|e| !names.contains(&e.name)));

    let fire = engine
        .pokedex("oak", &PokedexFilter::default().with_types_csv("fire"))
        .unwrap();
    assert!(fire.total >= 1);
    assert!(fire.items.iter().all(|e| e.type1 == "fire" || e.type2 == "fire"));

    assert!(engine
        .pokedex("nobody", &PokedexFilter::default())
        .unwrap_err()
        .is_not_found());
}

#[test]
fn seeded_world_fills_to_the_cap() {
    let rules = WorldRules {
        max_monsters: 120,
        ..WorldRules::default()
    };
    let dir = TempDir::new().unwrap();
    let engine = GameEngine::open(dir.path(), rules).unwrap();
    engine
        .seed_catalog(&load_templates_from_json(common::seed_file()).unwrap())
        .unwrap();

    let report = engine.ensure_monsters(500).unwrap();
    assert!(report.capped);
    assert_eq!(report.generated, 120);
    let status = engine.status().unwrap();
    assert_eq!(status.monsters, 120);
    assert_eq!(status.max_monsters, 120);
}
