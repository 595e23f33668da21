//! Auto-generated quests and their event-driven progress.
//!
//! Every character keeps at least `active_quest_floor` open quests. New ones
//! are rolled uniformly among the three kinds; progress is pushed by game
//! events (tile reached, monster killed, level changed) and each event only
//! looks at that character's open quests of the matching kind.

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::logutil::log_name;
use crate::validation::validate_coordinates;
use crate::world::errors::WorldError;
use crate::world::rules::WorldRules;
use crate::world::storage::WorldStore;
use crate::world::types::{CharacterRecord, MonsterTemplate, QuestGoal, QuestKind, QuestRecord};

/// Attempts at finding a tile-quest target off the town center.
const TILE_TARGET_ATTEMPTS: usize = 100;
const MIN_KILL_GOAL: u32 = 3;
const MAX_KILL_GOAL: u32 = 10;
const MIN_LEVEL_STEP: i32 = 1;
const MAX_LEVEL_STEP: i32 = 5;

/// What an event did to a character's quests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestProgress {
    /// Quests whose state changed (progress or completion).
    pub updated: usize,
    /// Quests completed by this event.
    pub completed: Vec<QuestRecord>,
    /// Quests that moved forward without completing.
    pub advanced: Vec<QuestRecord>,
    /// Replacement quests generated to restore the floor.
    pub generated: Vec<QuestRecord>,
}

impl QuestProgress {
    /// Split freshly persisted quests into completed and advanced ones.
    pub fn from_changed(changed: Vec<QuestRecord>) -> Self {
        let updated = changed.len();
        let (completed, advanced): (Vec<_>, Vec<_>) =
            changed.into_iter().partition(|q| q.is_completed);
        Self {
            updated,
            completed,
            advanced,
            generated: Vec::new(),
        }
    }

    /// Completion lines first, then `title: n/goal` for hunts still running.
    pub fn messages(&self) -> Vec<String> {
        let done = self
            .completed
            .iter()
            .map(|quest| format!("Quest completed: {}", quest.title));
        let running = self.advanced.iter().filter_map(|quest| match &quest.goal {
            QuestGoal::Monster {
                kill_count,
                kill_goal,
                ..
            } => Some(format!("{}: {}/{}", quest.title, kill_count, kill_goal)),
            _ => None,
        });
        done.chain(running).collect()
    }
}

/// Totals for one sweep over every character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub characters: usize,
    pub generated: usize,
    pub failures: usize,
}

/// Complete open tile quests targeting `(x, y)`. Returns the indices touched.
pub fn apply_tile_reached(quests: &mut [QuestRecord], x: i32, y: i32) -> Vec<usize> {
    let mut touched = Vec::new();
    for (index, quest) in quests.iter_mut().enumerate() {
        if !quest.is_open() {
            continue;
        }
        if let QuestGoal::Tile { x: tx, y: ty } = quest.goal {
            if (tx, ty) == (x, y) {
                quest.mark_complete();
                touched.push(index);
            }
        }
    }
    touched
}

/// Count a kill against open monster quests whose tag matches either type
/// of `template`. Returns the indices touched.
pub fn apply_monster_killed(quests: &mut [QuestRecord], template: &MonsterTemplate) -> Vec<usize> {
    let mut touched = Vec::new();
    for (index, quest) in quests.iter_mut().enumerate() {
        if !quest.is_open() {
            continue;
        }
        let done = match &mut quest.goal {
            QuestGoal::Monster {
                tag,
                kill_count,
                kill_goal,
            } if template.has_type(tag.as_str()) => {
                *kill_count = kill_count.saturating_add(1);
                *kill_count >= *kill_goal
            }
            _ => continue,
        };
        if done {
            quest.mark_complete();
        }
        touched.push(index);
    }
    touched
}

/// Complete open level quests whose goal is at or below `level`.
pub fn apply_level_reached(quests: &mut [QuestRecord], level: i32) -> Vec<usize> {
    let mut touched = Vec::new();
    for (index, quest) in quests.iter_mut().enumerate() {
        if !quest.is_open() {
            continue;
        }
        if let QuestGoal::Level { level_goal } = quest.goal {
            if level_goal <= level {
                quest.mark_complete();
                touched.push(index);
            }
        }
    }
    touched
}

/// Roll a new quest for `character`.
///
/// Monster quests need a template with a primary type; without one the roll
/// falls back to the other two kinds.
pub fn generate_quest<R: Rng + ?Sized>(
    rng: &mut R,
    rules: &WorldRules,
    character: &CharacterRecord,
    templates: &[MonsterTemplate],
    id: u64,
) -> QuestRecord {
    let typed: Vec<&MonsterTemplate> = templates.iter().filter(|t| !t.type1.is_empty()).collect();
    let kinds: &[QuestKind] = if typed.is_empty() {
        &[QuestKind::Tile, QuestKind::Level]
    } else {
        &QuestKind::ALL
    };
    let kind = kinds[rng.gen_range(0..kinds.len())];

    match (kind, typed.choose(rng)) {
        (QuestKind::Monster, Some(template)) => {
            let goal = rng.gen_range(MIN_KILL_GOAL..=MAX_KILL_GOAL);
            let tag = template.type1.clone();
            QuestRecord::new(
                id,
                character.id,
                &format!("Hunt {} {} monsters", goal, tag),
                &format!("Defeat {} monsters of type {}.", goal, tag),
                QuestGoal::Monster {
                    tag,
                    kill_count: 0,
                    kill_goal: goal,
                },
            )
        }
        (QuestKind::Level, _) | (QuestKind::Monster, None) => {
            let goal = character.level + rng.gen_range(MIN_LEVEL_STEP..=MAX_LEVEL_STEP);
            QuestRecord::new(
                id,
                character.id,
                &format!("Reach level {}", goal),
                &format!("Gain experience until you reach level {}.", goal),
                QuestGoal::Level { level_goal: goal },
            )
        }
        (QuestKind::Tile, _) => {
            let (x, y) = tile_target(rng, rules);
            QuestRecord::new(
                id,
                character.id,
                &format!("Explore ({}, {})", x, y),
                &format!("Travel to the tile at ({}, {}).", x, y),
                QuestGoal::Tile { x, y },
            )
        }
    }
}

fn tile_target<R: Rng + ?Sized>(rng: &mut R, rules: &WorldRules) -> (i32, i32) {
    let size = rules.world_size.max(1);
    for _ in 0..TILE_TARGET_ATTEMPTS {
        let candidate = (rng.gen_range(0..size), rng.gen_range(0..size));
        if !rules.is_town_center(candidate.0, candidate.1) {
            return candidate;
        }
    }
    // Only reachable on degenerate grids; any corner off the center will do.
    if rules.is_town_center(0, 0) {
        (size - 1, size - 1)
    } else {
        (0, 0)
    }
}

/// Generate quests until `character` has the configured floor of open ones.
pub fn ensure_quest_floor<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    character: &CharacterRecord,
) -> Result<Vec<QuestRecord>, WorldError> {
    let active = store.list_active_quests(character.id)?.len();
    if active >= rules.active_quest_floor {
        return Ok(Vec::new());
    }

    let templates = store.list_templates()?;
    let mut generated = Vec::with_capacity(rules.active_quest_floor - active);
    for _ in active..rules.active_quest_floor {
        let id = store.next_id()?;
        generated.push(generate_quest(rng, rules, character, &templates, id));
    }
    store.put_quests(&generated)?;
    debug!(
        "Generated {} quests for character {} ({})",
        generated.len(),
        character.id,
        log_name(&character.name)
    );
    Ok(generated)
}

/// Open quests for a character, topped up to the floor first.
pub fn active_quests<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    character_id: u64,
) -> Result<Vec<QuestRecord>, WorldError> {
    let character = store.get_character(character_id)?;
    ensure_quest_floor(store, rules, rng, &character)?;
    store.list_active_quests(character_id)
}

/// Persist the touched quests and top up the floor if anything completed.
fn finish_event<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    character: &CharacterRecord,
    quests: Vec<QuestRecord>,
    touched: Vec<usize>,
) -> Result<QuestProgress, WorldError> {
    if touched.is_empty() {
        return Ok(QuestProgress::default());
    }

    let changed: Vec<QuestRecord> = touched
        .into_iter()
        .filter_map(|index| quests.get(index).cloned())
        .collect();
    store.put_quests(&changed)?;

    let mut progress = QuestProgress::from_changed(changed);
    for quest in &progress.completed {
        info!(
            "Character {} completed quest '{}'",
            character.id,
            log_name(&quest.title)
        );
    }
    if !progress.completed.is_empty() {
        progress.generated = ensure_quest_floor(store, rules, rng, character)?;
    }
    Ok(progress)
}

pub fn notify_tile_reached<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    character_id: u64,
    x: i32,
    y: i32,
) -> Result<QuestProgress, WorldError> {
    validate_coordinates(x, y, rules.world_size)?;
    let character = store.get_character(character_id)?;
    let mut quests = store.list_active_quests(character_id)?;
    let touched = apply_tile_reached(&mut quests, x, y);
    finish_event(store, rules, rng, &character, quests, touched)
}

pub fn notify_monster_killed<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    character_id: u64,
    template_id: u32,
) -> Result<QuestProgress, WorldError> {
    let character = store.get_character(character_id)?;
    let template = store.get_template(template_id)?;
    let mut quests = store.list_active_quests(character_id)?;
    let touched = apply_monster_killed(&mut quests, &template);
    finish_event(store, rules, rng, &character, quests, touched)
}

/// Re-check level quests against the character's current level.
pub fn notify_level_changed<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    character_id: u64,
) -> Result<QuestProgress, WorldError> {
    let character = store.get_character(character_id)?;
    let mut quests = store.list_active_quests(character_id)?;
    let touched = apply_level_reached(&mut quests, character.level);
    finish_event(store, rules, rng, &character, quests, touched)
}

/// Top every character up to the quest floor. Per-character failures are
/// logged and counted; the sweep carries on.
pub fn sweep_all<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
) -> Result<SweepSummary, WorldError> {
    let mut summary = SweepSummary::default();
    for id in store.list_character_ids()? {
        summary.characters += 1;
        let result = store
            .get_character(id)
            .and_then(|character| ensure_quest_floor(store, rules, rng, &character));
        match result {
            Ok(generated) => summary.generated += generated.len(),
            Err(e) => {
                summary.failures += 1;
                warn!("Quest sweep failed for character {}: {}", id, e);
            }
        }
    }
    Ok(summary)
}
