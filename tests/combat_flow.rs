/// End-to-end combat: previews, victories, defeats, quest progress and the
/// hunt ledger, all through the engine facade.
mod common;

use gridrealm::world::{
    CombatOutcome, GameEngine, MonsterInstance, PokedexFilter, QuestGoal, QuestRecord,
    WorldError, WorldRules,
};
use tempfile::TempDir;

fn setup() -> (GameEngine, TempDir, u64) {
    let (engine, dir) = common::engine_with(WorldRules::default());
    let hero = engine.create_character("ash", "Ash").expect("character");
    (engine, dir, hero.id)
}

fn place(engine: &GameEngine, template_id: u32, x: i32, y: i32) -> MonsterInstance {
    let template = engine.store().get_template(template_id).expect("template");
    let monster = MonsterInstance::spawn(x, y, &template, 1);
    engine.store().put_monster(monster.clone()).expect("monster");
    monster
}

#[test]
fn preview_leaves_the_world_untouched() {
    let (engine, _dir, hero) = setup();
    let rat = place(&engine, 1, 11, 10);
    let before = engine.store().get_character(hero).unwrap();

    for _ in 0..5 {
        let preview = engine.simulate_combat(hero, 11, 10).unwrap();
        assert_eq!(preview.outcome, CombatOutcome::Victory);
        assert!(preview.turns >= 1);
        assert_eq!(preview.turn_log.len(), preview.turns as usize);
    }

    assert_eq!(engine.monster_at(11, 10).unwrap(), Some(rat));
    assert_eq!(engine.store().get_character(hero).unwrap(), before);
    assert!(!engine.store().has_hunted("ash", 1).unwrap());
}

#[test]
fn victory_grants_xp_and_clears_the_tile() {
    let (engine, _dir, hero) = setup();
    place(&engine, 1, 11, 10);

    let result = engine.execute_combat(hero, 11, 10).unwrap();
    assert!(result.is_victory());
    // Level-1 rat: base 5 XP plus 10 per level.
    assert_eq!(result.xp_gained, 15);
    assert!(!result.level_up);
    assert!(result.message.contains("Rat"));

    let after = engine.store().get_character(hero).unwrap();
    assert_eq!(after.xp, 15);
    assert_eq!(after.hp, 100 - result.damage_received);
    assert!(engine.monster_at(11, 10).unwrap().is_none());
    assert_eq!(engine.status().unwrap().deaths_since_regen, 1);

    let page = engine.pokedex("ash", &PokedexFilter::default()).unwrap();
    let rat = page.items.iter().find(|e| e.id == 1).expect("rat listed");
    assert!(rat.is_hunted);
    assert!(page.items.iter().filter(|e| e.id != 1).all(|e| !e.is_hunted));
}

#[test]
fn defeat_sends_the_character_home_and_keeps_the_monster() {
    let (engine, _dir, hero) = setup();
    engine.move_character(hero, 30, 30).unwrap();
    engine.store().delete_monster(31, 30).unwrap();
    place(&engine, 3, 31, 30);

    let result = engine.execute_combat(hero, 31, 30).unwrap();
    assert_eq!(result.outcome, CombatOutcome::Defeat);
    assert_eq!(result.xp_gained, 0);

    let after = engine.store().get_character(hero).unwrap();
    assert_eq!(after.position(), (10, 10));
    assert_eq!(after.hp, after.max_hp);
    assert_eq!(after.xp, 0);

    let golem = engine.monster_at(31, 30).unwrap().expect("golem survives");
    assert_eq!(golem.hp, golem.max_hp - result.damage_dealt);
    assert!(!engine.store().has_hunted("ash", 3).unwrap());
}

#[test]
fn kills_advance_matching_hunt_quests() {
    let (engine, _dir, hero) = setup();
    let quest = QuestRecord::new(
        engine.store().next_id().unwrap(),
        hero,
        "Cull the rats",
        "Defeat two normal-type monsters.",
        QuestGoal::Monster {
            tag: "normal".to_string(),
            kill_count: 0,
            kill_goal: 2,
        },
    );
    engine.store().put_quest(&quest).unwrap();

    place(&engine, 1, 11, 10);
    let first = engine.execute_combat(hero, 11, 10).unwrap();
    assert!(first
        .quest_messages
        .contains(&"Cull the rats: 1/2".to_string()));
    assert!(!first
        .quest_messages
        .contains(&"Quest completed: Cull the rats".to_string()));

    place(&engine, 2, 9, 10);
    engine.execute_combat(hero, 9, 10).unwrap();
    let stored = engine
        .store()
        .list_quests(hero)
        .unwrap()
        .into_iter()
        .find(|q| q.id == quest.id)
        .unwrap();
    assert!(stored.is_open(), "fire monster must not count");

    place(&engine, 1, 10, 11);
    let third = engine.execute_combat(hero, 10, 11).unwrap();
    assert!(third
        .quest_messages
        .contains(&"Quest completed: Cull the rats".to_string()));
    assert!(engine.active_quests(hero).unwrap().len() >= 3);
}

#[test]
fn winning_xp_levels_up_and_completes_level_quests() {
    let (engine, _dir, hero) = setup();
    let mut character = engine.store().get_character(hero).unwrap();
    character.xp = 99;
    engine.store().put_character(&character).unwrap();
    let quest = QuestRecord::new(
        engine.store().next_id().unwrap(),
        hero,
        "Reach level 2",
        "Gain experience until you reach level 2.",
        QuestGoal::Level { level_goal: 2 },
    );
    engine.store().put_quest(&quest).unwrap();

    place(&engine, 1, 11, 10);
    let result = engine.execute_combat(hero, 11, 10).unwrap();
    assert!(result.is_victory());
    assert!(result.level_up);
    assert!(result.message.contains("level 2"));
    assert!(result
        .quest_messages
        .contains(&"Quest completed: Reach level 2".to_string()));

    let after = engine.store().get_character(hero).unwrap();
    assert_eq!(after.level, 2);
    assert_eq!(after.max_hp, character.max_hp + 10);
    assert_eq!(after.hp, after.max_hp);

    let stored = engine
        .store()
        .list_quests(hero)
        .unwrap()
        .into_iter()
        .find(|q| q.id == quest.id)
        .unwrap();
    assert!(stored.is_completed && !stored.is_active);
    assert_eq!(engine.store().list_active_quests(hero).unwrap().len(), 3);
}

#[test]
fn missing_parties_are_not_found() {
    let (engine, _dir, hero) = setup();
    let err = engine.execute_combat(hero, 40, 40).unwrap_err();
    assert!(err.is_not_found());

    place(&engine, 1, 11, 10);
    let err = engine.simulate_combat(hero + 1_000, 11, 10).unwrap_err();
    assert!(err.is_not_found());

    assert!(matches!(
        engine.execute_combat(hero, -1, 0),
        Err(WorldError::Validation(_))
    ));
}
