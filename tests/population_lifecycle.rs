/// Integration tests for the monster population: cap, placement rules,
/// regeneration accounting and concurrent batches.
mod common;

use std::sync::Arc;
use std::thread;

use gridrealm::world::{PopulationManager, WorldRules};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn tight_rules() -> WorldRules {
    WorldRules {
        world_size: 8,
        town_center_x: 3,
        town_center_y: 3,
        max_monsters: 20,
        regen_threshold: 4,
        ..WorldRules::default()
    }
}

#[test]
fn population_never_exceeds_cap() {
    let (engine, _dir) = common::engine_with(WorldRules::default());
    for _ in 0..3 {
        let report = engine.ensure_monsters(10_000).unwrap();
        assert!(report.generated <= 300);
    }
    assert_eq!(engine.store().count_monsters(), 300);
    let report = engine.ensure_monsters(10_000).unwrap();
    assert_eq!(report.generated, 0);
}

#[test]
fn monsters_only_live_on_habitat_tiles() {
    let (engine, _dir) = common::engine_with(WorldRules::default());
    // Pre-generate some terrain so the spawner meets water and mountains.
    for x in 0..50 {
        engine.tile_at(x, 0).unwrap();
    }
    engine.ensure_monsters(200).unwrap();

    let store = engine.store();
    for monster in store.list_monsters().unwrap() {
        assert_ne!((monster.x, monster.y), (10, 10));
        let tile = store.get_tile(monster.x, monster.y).unwrap().expect("tile exists");
        assert!(tile.is_monster_habitat(), "monster on {:?}", tile.kind);
        assert!(monster.level >= 1);
    }
}

#[test]
fn levels_grow_with_distance_from_town() {
    let (engine, _dir) = common::engine_with(WorldRules::default());
    engine.ensure_monsters(300).unwrap();
    let towns = engine.store().town_positions().unwrap();
    for monster in engine.store().list_monsters().unwrap() {
        let nearest = towns
            .iter()
            .map(|(x, y)| (x - monster.x).abs() + (y - monster.y).abs())
            .min()
            .expect("town center exists");
        assert_eq!(monster.level, nearest.max(1));
    }
}

#[test]
fn removing_threshold_monsters_regenerates_once() {
    let rules = tight_rules();
    let (store, _dir) = common::store_with(&rules);
    let population = PopulationManager::new(store.clone(), rules);
    let mut rng = StdRng::seed_from_u64(99);
    population.ensure_population(&mut rng, 10).unwrap();

    let victims: Vec<_> = store.list_monsters().unwrap().into_iter().take(4).collect();
    let mut batches = 0;
    for monster in victims {
        let report = population.remove(&mut rng, monster.x, monster.y).unwrap();
        if let Some(regen) = report.regenerated {
            batches += 1;
            assert_eq!(regen.generated, 4);
        }
    }
    assert_eq!(batches, 1);
    assert_eq!(store.count_monsters(), 10);

    // A second removal of a cleared tile changes nothing.
    let empty = (0..8)
        .flat_map(|x| (0..8).map(move |y| (x, y)))
        .find(|&(x, y)| store.monster_at(x, y).unwrap().is_none())
        .expect("free cell");
    let report = population.remove(&mut rng, empty.0, empty.1).unwrap();
    assert!(!report.removed);
    assert_eq!(store.deaths_since_regen().unwrap(), 0);
}

#[test]
fn regeneration_respects_the_cap() {
    let rules = tight_rules();
    let (store, _dir) = common::store_with(&rules);
    let population = PopulationManager::new(store.clone(), rules);
    let mut rng = StdRng::seed_from_u64(5);
    population.ensure_population(&mut rng, 20).unwrap();
    assert_eq!(store.count_monsters(), 20);

    // Three deaths, then refill by hand so the fourth death regenerates into a
    // world with room for only one more monster.
    let victims: Vec<_> = store.list_monsters().unwrap().into_iter().take(4).collect();
    for monster in &victims[..3] {
        let report = population.remove(&mut rng, monster.x, monster.y).unwrap();
        assert!(report.regenerated.is_none());
    }
    population.spawn_batch(&mut rng, 3).unwrap();
    assert_eq!(store.count_monsters(), 20);

    let last = &victims[3];
    let report = population.remove(&mut rng, last.x, last.y).unwrap();
    let regen = report.regenerated.expect("fourth death regenerates");
    assert_eq!(regen.requested, 4);
    assert_eq!(regen.generated, 1);
    assert!(regen.capped);
    assert_eq!(store.count_monsters(), 20);
}

#[test]
fn concurrent_batches_share_the_cap() {
    let rules = tight_rules();
    let (store, _dir) = common::store_with(&rules);
    let population = Arc::new(PopulationManager::new(store.clone(), rules));

    let handles: Vec<_> = (0..6)
        .map(|seed| {
            let population = population.clone();
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                population.spawn_batch(&mut rng, 15).expect("spawn")
            })
        })
        .collect();
    let generated: usize = handles
        .into_iter()
        .map(|h| h.join().expect("thread").generated)
        .sum();

    assert_eq!(generated, 20);
    assert_eq!(store.count_monsters(), 20);
    let positions = store.occupied_positions().unwrap();
    assert_eq!(positions.len(), 20);
}
