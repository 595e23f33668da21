//! Monster population management.
//!
//! Keeps a bounded set of monster instances on the grid: batch spawning,
//! removal with death accounting, and regeneration once enough monsters
//! have died. Monster level grows with Manhattan distance from the nearest
//! town, so the world gets harder the further players wander.
//!
//! Spawning is serialized by an internal mutex so two concurrent batches can
//! never push the population past the cap. The store stays the only source
//! of truth; nothing is mirrored in memory.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::logutil::{log_name, fmt_pos};
use crate::world::errors::WorldError;
use crate::world::rules::WorldRules;
use crate::world::storage::WorldStore;
use crate::world::terrain::materialize_tile;
use crate::world::types::{MonsterInstance, MonsterTemplate, TerrainKind, TileRecord};

/// Outcome of a spawn request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnReport {
    pub requested: usize,
    pub generated: usize,
    /// True when the population cap cut the request short.
    pub capped: bool,
}

/// Outcome of removing a monster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// False when nothing lived at the position.
    pub removed: bool,
    /// Present when this removal triggered a regeneration batch.
    pub regenerated: Option<SpawnReport>,
}

/// Level for a monster at `(x, y)`: Manhattan distance to the closest town,
/// at least 1. With no town on the map a small random level is used instead.
pub fn level_for_position<R: Rng + ?Sized>(
    rng: &mut R,
    rules: &WorldRules,
    towns: &[(i32, i32)],
    x: i32,
    y: i32,
) -> i32 {
    let distance = towns
        .iter()
        .map(|(tx, ty)| (tx - x).abs() + (ty - y).abs())
        .min()
        .unwrap_or_else(|| rng.gen_range(0..rules.regen_threshold.max(1)) as i32);
    distance.max(1)
}

pub struct PopulationManager {
    store: Arc<WorldStore>,
    rules: WorldRules,
    spawn_lock: Mutex<()>,
}

impl PopulationManager {
    pub fn new(store: Arc<WorldStore>, rules: WorldRules) -> Self {
        Self {
            store,
            rules,
            spawn_lock: Mutex::new(()),
        }
    }

    pub fn rules(&self) -> &WorldRules {
        &self.rules
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, WorldError> {
        self.spawn_lock
            .lock()
            .map_err(|_| WorldError::Internal("population lock poisoned".to_string()))
    }

    pub fn get_by_position(&self, x: i32, y: i32) -> Result<Option<MonsterInstance>, WorldError> {
        self.store.monster_at(x, y)
    }

    pub fn count(&self) -> usize {
        self.store.count_monsters()
    }

    /// Top the population up to `target` live monsters (never past the cap).
    ///
    /// A no-op when the store already holds `target` monsters or the catalog
    /// is empty.
    pub fn ensure_population<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        target: usize,
    ) -> Result<SpawnReport, WorldError> {
        let _guard = self.lock()?;
        let existing = self.store.count_monsters();
        if existing >= target {
            debug!(
                "Population already at {} (target {}); nothing to spawn",
                existing, target
            );
            return Ok(SpawnReport {
                requested: 0,
                generated: 0,
                capped: false,
            });
        }
        self.spawn_locked(rng, target - existing)
    }

    /// Spawn up to `count` new monsters, bounded by the remaining capacity.
    pub fn spawn_batch<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> Result<SpawnReport, WorldError> {
        let _guard = self.lock()?;
        self.spawn_locked(rng, count)
    }

    fn spawn_locked<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> Result<SpawnReport, WorldError> {
        let mut report = SpawnReport {
            requested: count,
            ..SpawnReport::default()
        };
        if count == 0 {
            return Ok(report);
        }

        let templates = self.store.list_templates()?;
        if templates.is_empty() {
            warn!("No monster templates in the catalog; skipping spawn of {}", count);
            return Ok(report);
        }

        let existing = self.store.count_monsters();
        let room = self.rules.max_monsters.saturating_sub(existing);
        let to_generate = count.min(room);
        if to_generate < count {
            report.capped = true;
            warn!(
                "Monster cap {} reached ({} alive); spawning {} of {} requested",
                self.rules.max_monsters, existing, to_generate, count
            );
        }
        if to_generate == 0 {
            return Ok(report);
        }

        let occupied = self.store.occupied_positions()?;
        let tiles: HashMap<(i32, i32), TileRecord> = self
            .store
            .list_tiles()?
            .into_iter()
            .map(|tile| ((tile.x, tile.y), tile))
            .collect();
        let towns: Vec<(i32, i32)> = tiles
            .values()
            .filter(|tile| tile.kind == TerrainKind::Town)
            .map(|tile| (tile.x, tile.y))
            .collect();

        let mut candidates = self.free_positions(&occupied, &tiles);
        candidates.shuffle(rng);

        for (x, y) in candidates {
            if report.generated == to_generate {
                break;
            }
            let tile = match tiles.get(&(x, y)) {
                Some(tile) => tile.clone(),
                None => {
                    materialize_tile(
                        &self.store,
                        &self.rules,
                        rng,
                        x,
                        y,
                        &TerrainKind::MONSTER_HABITAT,
                    )?
                    .tile
                }
            };
            if !tile.is_monster_habitat() {
                continue;
            }
            let Some(template) = templates.choose(rng) else {
                break;
            };
            let level = level_for_position(rng, &self.rules, &towns, x, y);
            let monster = MonsterInstance::spawn(x, y, template, level);
            if self.store.insert_monster_if_absent(&monster)? {
                report.generated += 1;
            }
        }
        self.store.flush()?;

        if report.generated < to_generate {
            info!(
                "Spawned {} of {} monsters (free positions exhausted)",
                report.generated, to_generate
            );
        } else {
            info!("Spawned {} new monsters", report.generated);
        }
        Ok(report)
    }

    /// Every cell a monster could be placed on right now.
    fn free_positions(
        &self,
        occupied: &HashSet<(i32, i32)>,
        tiles: &HashMap<(i32, i32), TileRecord>,
    ) -> Vec<(i32, i32)> {
        let size = self.rules.world_size;
        (0..size)
            .flat_map(|x| (0..size).map(move |y| (x, y)))
            .filter(|&(x, y)| !self.rules.is_town_center(x, y))
            .filter(|pos| !occupied.contains(pos))
            .filter(|pos| tiles.get(pos).map_or(true, TileRecord::is_monster_habitat))
            .collect()
    }

    /// Maybe place a monster on a tile that was just discovered.
    ///
    /// Rolls the configured discovery chance, then respects the cap, the
    /// catalog and the habitat rules. Returns the spawned monster, if any.
    pub fn spawn_on_discovery<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        tile: &TileRecord,
    ) -> Result<Option<MonsterInstance>, WorldError> {
        if self.rules.is_town_center(tile.x, tile.y) || !tile.is_monster_habitat() {
            return Ok(None);
        }
        if rng.gen_range(0..100u8) >= self.rules.discovery_spawn_chance_percent {
            return Ok(None);
        }

        let _guard = self.lock()?;
        if self.store.count_monsters() >= self.rules.max_monsters {
            debug!(
                "Monster cap reached; no discovery spawn at {}",
                fmt_pos(tile.x, tile.y)
            );
            return Ok(None);
        }
        let templates = self.store.list_templates()?;
        let Some(template) = templates.choose(rng) else {
            return Ok(None);
        };
        let towns = self.store.town_positions()?;
        let level = level_for_position(rng, &self.rules, &towns, tile.x, tile.y);
        let monster = MonsterInstance::spawn(tile.x, tile.y, template, level);
        if !self.store.insert_monster_if_absent(&monster)? {
            return Ok(None);
        }
        self.store.flush()?;
        info!(
            "{} (level {}) appeared at {}",
            log_name(&template.name),
            level,
            fmt_pos(tile.x, tile.y)
        );
        Ok(Some(monster))
    }

    /// Remove the monster at `(x, y)`. Absent monsters are a silent no-op.
    pub fn remove<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        x: i32,
        y: i32,
    ) -> Result<RemovalReport, WorldError> {
        if !self.store.delete_monster(x, y)? {
            return Ok(RemovalReport::default());
        }
        Ok(RemovalReport {
            removed: true,
            regenerated: self.record_death(rng)?,
        })
    }

    /// Count a monster death; every `regen_threshold` deaths spawn a batch of
    /// that size and reset the counter.
    pub fn record_death<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Option<SpawnReport>, WorldError> {
        let _guard = self.lock()?;
        let deaths = self.store.increment_deaths()?;
        if deaths < self.rules.regen_threshold {
            return Ok(None);
        }
        self.store.reset_deaths()?;
        info!("{} monsters defeated since last regeneration; repopulating", deaths);
        self.spawn_locked(rng, deaths as usize).map(Some)
    }

    /// Template for a live monster, if the catalog still has it.
    pub fn template_for(
        &self,
        monster: &MonsterInstance,
    ) -> Result<Option<MonsterTemplate>, WorldError> {
        self.store.find_template(monster.template_id)
    }
}
