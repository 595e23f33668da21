//! Turn-based combat between a character and a monster instance.
//!
//! Each turn draws one shared variance factor in `[0.8, 1.25)` and applies it
//! to both damage rolls, which land simultaneously. Both sides always deal at
//! least 1 damage, so a fight ends in a bounded number of turns. If both fall
//! in the same turn the character wins.

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::logutil::{log_name, fmt_pos};
use crate::world::errors::WorldError;
use crate::world::population::PopulationManager;
use crate::world::quest::{
    apply_level_reached, apply_monster_killed, ensure_quest_floor, QuestProgress,
};
use crate::world::storage::{CharacterWrite, MonsterWrite, WorldStore};
use crate::world::types::{CharacterRecord, HuntedRecord, MonsterInstance, MonsterTemplate};

pub const MIN_VARIANCE: f64 = 0.8;
pub const MAX_VARIANCE: f64 = 1.25;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    Victory,
    Defeat,
}

/// Report of one combat, simulated or executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatResult {
    pub outcome: CombatOutcome,
    pub turns: u32,
    pub damage_dealt: i32,
    pub damage_received: i32,
    /// Zero on defeat.
    pub xp_gained: i32,
    pub turn_log: Vec<String>,
    pub message: String,
    pub level_up: bool,
    /// Quest completions and hunt progress from an executed victory.
    #[serde(default)]
    pub quest_messages: Vec<String>,
}

impl CombatResult {
    pub fn is_victory(&self) -> bool {
        self.outcome == CombatOutcome::Victory
    }
}

/// Final state of a resolved fight, before anything is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Battle {
    pub outcome: CombatOutcome,
    pub turns: u32,
    pub damage_dealt: i32,
    pub damage_received: i32,
    pub character_hp: i32,
    pub monster_hp: i32,
    pub turn_log: Vec<String>,
}

pub fn roll_multiplier<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(MIN_VARIANCE..MAX_VARIANCE)
}

/// Damage for one side of a turn: `max(1, round((attack - defense) * factor))`.
pub fn turn_damage(attack: i32, defense: i32, factor: f64) -> i32 {
    let raw = (f64::from(attack) - f64::from(defense)) * factor;
    (raw.round() as i32).max(1)
}

/// Run the turn loop on local copies of both hp pools.
pub fn resolve<R: Rng + ?Sized>(
    rng: &mut R,
    character: &CharacterRecord,
    monster: &MonsterInstance,
    template: &MonsterTemplate,
) -> Battle {
    let monster_attack = monster.effective_attack(template);
    let monster_defense = monster.effective_defense(template);
    let mut character_hp = character.hp.max(0);
    let mut monster_hp = monster.hp.max(0);
    let mut battle = Battle {
        outcome: CombatOutcome::Defeat,
        turns: 0,
        damage_dealt: 0,
        damage_received: 0,
        character_hp,
        monster_hp,
        turn_log: Vec::new(),
    };

    loop {
        let factor = roll_multiplier(rng);
        let dealt = turn_damage(character.attack, monster_defense, factor);
        let received = turn_damage(monster_attack, character.defense, factor);

        monster_hp = (monster_hp - dealt).max(0);
        character_hp = (character_hp - received).max(0);
        battle.turns += 1;
        battle.damage_dealt += dealt;
        battle.damage_received += received;
        battle.turn_log.push(format!(
            "Turn {}: you deal {} damage, {} deals {} damage",
            battle.turns, dealt, template.name, received
        ));

        if monster_hp == 0 {
            battle.outcome = CombatOutcome::Victory;
            break;
        }
        if character_hp == 0 {
            battle.outcome = CombatOutcome::Defeat;
            break;
        }
    }

    battle.character_hp = character_hp;
    battle.monster_hp = monster_hp;
    battle
}

fn load_combatants(
    store: &WorldStore,
    character_id: u64,
    x: i32,
    y: i32,
) -> Result<(CharacterRecord, MonsterInstance, MonsterTemplate), WorldError> {
    let character = store.get_character(character_id)?;
    let monster = store
        .monster_at(x, y)?
        .ok_or_else(|| WorldError::NotFound(format!("monster at {}", fmt_pos(x, y))))?;
    let template = store.get_template(monster.template_id)?;
    Ok((character, monster, template))
}

/// Preview a fight without touching the store.
pub fn simulate_combat<R: Rng + ?Sized>(
    store: &WorldStore,
    rng: &mut R,
    character_id: u64,
    x: i32,
    y: i32,
) -> Result<CombatResult, WorldError> {
    let (character, monster, template) = load_combatants(store, character_id, x, y)?;
    let battle = resolve(rng, &character, &monster, &template);
    let xp = match battle.outcome {
        CombatOutcome::Victory => monster.xp_reward(&template),
        CombatOutcome::Defeat => 0,
    };
    let message = match battle.outcome {
        CombatOutcome::Victory => format!(
            "You would defeat {} in {} turns and earn {} XP.",
            template.name, battle.turns, xp
        ),
        CombatOutcome::Defeat => format!(
            "{} would defeat you in {} turns.",
            template.name, battle.turns
        ),
    };
    Ok(CombatResult {
        outcome: battle.outcome,
        turns: battle.turns,
        damage_dealt: battle.damage_dealt,
        damage_received: battle.damage_received,
        xp_gained: xp,
        turn_log: battle.turn_log,
        message,
        level_up: false,
        quest_messages: Vec::new(),
    })
}

/// Fight for real.
///
/// Victory grants XP, removes the monster, advances monster and level quests
/// and logs the species in the player's hunt ledger. Defeat sends the
/// character home with full health and leaves the monster wounded. Character,
/// monster and quest writes commit as one transaction.
pub fn execute_combat<R: Rng + ?Sized>(
    store: &WorldStore,
    population: &PopulationManager,
    rng: &mut R,
    character_id: u64,
    x: i32,
    y: i32,
) -> Result<CombatResult, WorldError> {
    let (character, mut monster, template) = load_combatants(store, character_id, x, y)?;
    let battle = resolve(rng, &character, &monster, &template);

    let mut result = CombatResult {
        outcome: battle.outcome,
        turns: battle.turns,
        damage_dealt: battle.damage_dealt,
        damage_received: battle.damage_received,
        xp_gained: 0,
        turn_log: battle.turn_log,
        message: String::new(),
        level_up: false,
        quest_messages: Vec::new(),
    };

    match battle.outcome {
        CombatOutcome::Victory => {
            let xp = monster.xp_reward(&template);
            result.xp_gained = xp;

            let active = store.list_active_quests(character.id)?;
            let committed = store.commit_combat(
                character.id,
                CharacterWrite::Victory {
                    hp: battle.character_hp,
                    xp,
                },
                MonsterWrite::Remove { x, y },
                |hero, levelled| {
                    let mut quests = active.clone();
                    let mut touched = apply_monster_killed(&mut quests, &template);
                    if levelled {
                        touched.extend(apply_level_reached(&mut quests, hero.level));
                    }
                    touched.sort_unstable();
                    touched.dedup();
                    touched
                        .into_iter()
                        .filter_map(|index| quests.get(index).cloned())
                        .collect()
                },
            )?;
            let character = committed.character;
            result.level_up = committed.level_up;

            let hunted = HuntedRecord::new(&character.owner, template.id);
            match store.record_hunted_if_absent(&hunted) {
                Ok(true) => info!(
                    "{} hunted {} for the first time",
                    log_name(&character.name),
                    log_name(&template.name)
                ),
                Ok(false) => {}
                Err(e) => warn!(
                    "Failed to record hunt of template {} for character {}: {}",
                    template.id, character.id, e
                ),
            }

            if committed.monster_written {
                if let Some(regen) = population.record_death(rng)? {
                    info!(
                        "Regenerated {} monsters after {} fell",
                        regen.generated,
                        log_name(&template.name)
                    );
                }
            }

            let mut progress = QuestProgress::from_changed(committed.quests);
            if !progress.completed.is_empty() {
                progress.generated =
                    ensure_quest_floor(store, population.rules(), rng, &character)?;
            }
            result.quest_messages = progress.messages();

            result.message = if result.level_up {
                format!(
                    "You defeated {} and earned {} XP. Level up! You are now level {}.",
                    template.name, xp, character.level
                )
            } else {
                format!("You defeated {} and earned {} XP.", template.name, xp)
            };
            info!(
                "{} defeated {} (level {}) at {} in {} turns",
                log_name(&character.name),
                log_name(&template.name),
                monster.level,
                fmt_pos(x, y),
                battle.turns
            );
        }
        CombatOutcome::Defeat => {
            monster.hp = battle.monster_hp;
            let committed = store.commit_combat(
                character.id,
                CharacterWrite::Defeat,
                MonsterWrite::Wound(&monster),
                |_, _| Vec::new(),
            )?;
            if !committed.monster_written {
                debug!(
                    "{} left {} before the fight was committed",
                    log_name(&template.name),
                    fmt_pos(x, y)
                );
            }
            let character = committed.character;
            result.message = format!(
                "{} defeated you. You wake up at home at {} with full health.",
                template.name,
                fmt_pos(character.home_x, character.home_y)
            );
            info!(
                "{} was defeated by {} at {}",
                log_name(&character.name),
                log_name(&template.name),
                fmt_pos(x, y)
            );
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::rules::WorldRules;
    use crate::world::storage::WorldStoreBuilder;
    use crate::world::types::{QuestGoal, QuestRecord};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        store: Arc<WorldStore>,
        population: PopulationManager,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(WorldStoreBuilder::new(dir.path()).open().expect("store"));
        store
            .seed_templates(&[
                MonsterTemplate::new(1, "Rat", 10, 4, 1, 5).with_types("normal", ""),
                MonsterTemplate::new(2, "Golem", 500, 60, 40, 50).with_types("rock", ""),
            ])
            .unwrap();
        let population = PopulationManager::new(store.clone(), WorldRules::default());
        Fixture {
            store,
            population,
            _dir: dir,
        }
    }

    fn hero(store: &WorldStore) -> CharacterRecord {
        let character = CharacterRecord::new(store.next_id().unwrap(), "ash@example.com", "Ash", (10, 10));
        store.create_character(&character).unwrap();
        character
    }

    fn place(store: &WorldStore, template_id: u32, x: i32, y: i32, level: i32) -> MonsterInstance {
        let template = store.get_template(template_id).unwrap();
        let monster = MonsterInstance::spawn(x, y, &template, level);
        assert!(store.insert_monster_if_absent(&monster).unwrap());
        monster
    }

    #[test]
    fn damage_is_at_least_one() {
        assert_eq!(turn_damage(5, 50, 1.2), 1);
        assert_eq!(turn_damage(5, 5, 0.8), 1);
        assert_eq!(turn_damage(20, 2, 1.0), 18);
        assert_eq!(turn_damage(10, 5, 1.0), 5);
    }

    #[test]
    fn damage_stays_within_variance_bounds() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..1_000 {
            let factor = roll_multiplier(&mut rng);
            assert!((MIN_VARIANCE..MAX_VARIANCE).contains(&factor));
            let damage = turn_damage(30, 12, factor);
            assert!(damage >= 1);
            assert!(damage <= (1.25f64 * 18.0).round() as i32);
        }
    }

    #[test]
    fn fights_terminate_and_log_every_turn() {
        let mut rng = StdRng::seed_from_u64(2);
        let template = MonsterTemplate::new(1, "Tank", 1_000, 1, 1_000, 0);
        let monster = MonsterInstance::spawn(0, 0, &template, 1);
        let mut character = CharacterRecord::new(1, "p", "Hero", (10, 10));
        character.hp = 5_000;
        let battle = resolve(&mut rng, &character, &monster, &template);
        assert_eq!(battle.outcome, CombatOutcome::Victory);
        assert_eq!(battle.turns as usize, battle.turn_log.len());
        assert_eq!(battle.damage_dealt, 1_001);
        assert_eq!(battle.monster_hp, 0);
    }

    #[test]
    fn mutual_knockout_counts_as_victory() {
        let mut rng = StdRng::seed_from_u64(2);
        let template = MonsterTemplate::new(1, "Glass", 0, 200, 0, 0);
        let monster = MonsterInstance::spawn(0, 0, &template, 1);
        let mut character = CharacterRecord::new(1, "p", "Hero", (10, 10));
        character.hp = 1;
        let battle = resolve(&mut rng, &character, &monster, &template);
        assert_eq!(battle.turns, 1);
        assert_eq!(battle.character_hp, 0);
        assert_eq!(battle.outcome, CombatOutcome::Victory);
    }

    #[test]
    fn simulation_leaves_store_untouched() {
        let fx = fixture();
        let character = hero(&fx.store);
        let monster = place(&fx.store, 1, 12, 10, 2);
        let mut rng = StdRng::seed_from_u64(9);

        let result = simulate_combat(&fx.store, &mut rng, character.id, 12, 10).unwrap();
        assert!(result.is_victory());
        assert_eq!(result.xp_gained, 25);
        assert_eq!(fx.store.get_character(character.id).unwrap(), character);
        assert_eq!(fx.store.monster_at(12, 10).unwrap(), Some(monster));
        assert!(!fx.store.has_hunted("ash@example.com", 1).unwrap());
    }

    #[test]
    fn missing_monster_is_not_found() {
        let fx = fixture();
        let character = hero(&fx.store);
        let mut rng = StdRng::seed_from_u64(9);
        let err = simulate_combat(&fx.store, &mut rng, character.id, 3, 3).unwrap_err();
        assert!(err.is_not_found());
        let err = execute_combat(&fx.store, &fx.population, &mut rng, 4242, 3, 3).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn victory_grants_xp_and_clears_the_tile() {
        let fx = fixture();
        let character = hero(&fx.store);
        place(&fx.store, 1, 12, 10, 2);
        fx.store
            .put_quest(&QuestRecord::new(
                fx.store.next_id().unwrap(),
                character.id,
                "Hunt 1 normal monsters",
                "",
                QuestGoal::Monster {
                    tag: "normal".to_string(),
                    kill_count: 0,
                    kill_goal: 1,
                },
            ))
            .unwrap();
        let mut rng = StdRng::seed_from_u64(9);

        let result = execute_combat(&fx.store, &fx.population, &mut rng, character.id, 12, 10).unwrap();
        assert!(result.is_victory());
        assert_eq!(result.xp_gained, 25);
        assert_eq!(result.quest_messages, vec!["Quest completed: Hunt 1 normal monsters".to_string()]);

        let stored = fx.store.get_character(character.id).unwrap();
        assert_eq!(stored.xp, 25);
        assert_eq!(stored.hp, 100 - result.damage_received);
        assert!(fx.store.monster_at(12, 10).unwrap().is_none());
        assert!(fx.store.has_hunted("ash@example.com", 1).unwrap());
        assert_eq!(fx.store.deaths_since_regen().unwrap(), 1);
        assert_eq!(fx.store.list_active_quests(character.id).unwrap().len(), 3);
    }

    #[test]
    fn defeat_sends_character_home() {
        let fx = fixture();
        let mut character = hero(&fx.store);
        character.x = 30;
        character.y = 31;
        fx.store.put_character(&character).unwrap();
        place(&fx.store, 2, 30, 32, 20);
        let mut rng = StdRng::seed_from_u64(9);

        let result = execute_combat(&fx.store, &fx.population, &mut rng, character.id, 30, 32).unwrap();
        assert_eq!(result.outcome, CombatOutcome::Defeat);
        assert_eq!(result.xp_gained, 0);

        let stored = fx.store.get_character(character.id).unwrap();
        assert_eq!(stored.position(), (10, 10));
        assert_eq!(stored.hp, stored.max_hp);
        assert_eq!(stored.xp, 0);
        let survivor = fx.store.monster_at(30, 32).unwrap().expect("monster survives");
        assert_eq!(survivor.hp, survivor.max_hp - result.damage_dealt);
    }
}
