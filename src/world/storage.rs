use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::de::DeserializeOwned;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Batch, Transactional};

use crate::world::errors::WorldError;
use crate::world::types::{
    CharacterRecord, HuntedRecord, MonsterInstance, MonsterTemplate, QuestRecord, TerrainKind,
    TileRecord, CHARACTER_SCHEMA_VERSION, HUNTED_SCHEMA_VERSION, MONSTER_SCHEMA_VERSION,
    QUEST_SCHEMA_VERSION, TEMPLATE_SCHEMA_VERSION, TILE_SCHEMA_VERSION,
};

const TREE_TILES: &str = "world_tiles";
const TREE_MONSTERS: &str = "world_monsters";
const TREE_TEMPLATES: &str = "world_templates";
const TREE_CHARACTERS: &str = "world_characters";
const TREE_QUESTS: &str = "world_quests";
const TREE_HUNTED: &str = "world_hunted";
const TREE_META: &str = "world_meta";

const DEATHS_KEY: &[u8] = b"counters:deaths_since_regen";

/// Records carrying a schema version byte that is checked on every read.
trait Versioned {
    const ENTITY: &'static str;
    const VERSION: u8;
    fn schema_version(&self) -> u8;
}

macro_rules! versioned {
    ($ty:ty, $entity:literal, $version:expr) => {
        impl Versioned for $ty {
            const ENTITY: &'static str = $entity;
            const VERSION: u8 = $version;
            fn schema_version(&self) -> u8 {
                self.schema_version
            }
        }
    };
}

versioned!(TileRecord, "tile", TILE_SCHEMA_VERSION);
versioned!(MonsterTemplate, "template", TEMPLATE_SCHEMA_VERSION);
versioned!(MonsterInstance, "monster", MONSTER_SCHEMA_VERSION);
versioned!(CharacterRecord, "character", CHARACTER_SCHEMA_VERSION);
versioned!(QuestRecord, "quest", QUEST_SCHEMA_VERSION);
versioned!(HuntedRecord, "hunted", HUNTED_SCHEMA_VERSION);

/// Character side of a combat commit. Applied to the character row as it
/// stands when the transaction runs, so a move or another fight that landed
/// in the meantime is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterWrite {
    /// The character won: keep the battle hp and grant the XP reward.
    Victory { hp: i32, xp: i32 },
    /// The character lost: home at full health.
    Defeat,
}

impl CharacterWrite {
    /// Apply to `character`. Returns true when it levelled up.
    pub fn apply(self, character: &mut CharacterRecord) -> bool {
        match self {
            CharacterWrite::Victory { hp, xp } => {
                character.hp = hp.clamp(0, character.max_hp);
                character.gain_xp(xp)
            }
            CharacterWrite::Defeat => {
                character.teleport_home();
                false
            }
        }
    }
}

/// Monster side of a combat commit.
#[derive(Debug, Clone, Copy)]
pub enum MonsterWrite<'a> {
    /// The monster survived. Its hp drops to the battle value, but only while
    /// the same spawn still holds the tile.
    Wound(&'a MonsterInstance),
    /// The monster was defeated; free its tile.
    Remove { x: i32, y: i32 },
}

/// What a combat commit left in the store.
#[derive(Debug, Clone)]
pub struct CombatCommitted {
    pub character: CharacterRecord,
    pub level_up: bool,
    pub quests: Vec<QuestRecord>,
    /// The monster row was removed (victory) or wounded (defeat).
    pub monster_written: bool,
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct WorldStoreBuilder {
    path: PathBuf,
    ensure_world_seed: bool,
    town_center: (i32, i32),
}

impl WorldStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ensure_world_seed: true,
            town_center: (10, 10),
        }
    }

    /// Opt out of seeding the town-center tile during initialization.
    pub fn without_world_seed(mut self) -> Self {
        self.ensure_world_seed = false;
        self
    }

    pub fn with_town_center(mut self, x: i32, y: i32) -> Self {
        self.town_center = (x, y);
        self
    }

    pub fn open(self) -> Result<WorldStore, WorldError> {
        WorldStore::open_with_options(self.path, self.ensure_world_seed, self.town_center)
    }
}

/// Sled-backed persistence for tiles, monsters, characters, quests and the hunt ledger.
///
/// Uniqueness of `(x, y)` for tiles and monsters is enforced with
/// compare-and-swap inserts; the loser of a race gets the winner's record back.
pub struct WorldStore {
    db: sled::Db,
    tiles: sled::Tree,
    monsters: sled::Tree,
    templates: sled::Tree,
    characters: sled::Tree,
    quests: sled::Tree,
    hunted: sled::Tree,
    meta: sled::Tree,
    town_center: (i32, i32),
}

impl WorldStore {
    /// Open (or create) the store rooted at `path`, seeding the town center at (10, 10).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WorldError> {
        Self::open_with_options(path, true, (10, 10))
    }

    fn open_with_options<P: AsRef<Path>>(
        path: P,
        seed_world: bool,
        town_center: (i32, i32),
    ) -> Result<Self, WorldError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let store = Self {
            tiles: db.open_tree(TREE_TILES)?,
            monsters: db.open_tree(TREE_MONSTERS)?,
            templates: db.open_tree(TREE_TEMPLATES)?,
            characters: db.open_tree(TREE_CHARACTERS)?,
            quests: db.open_tree(TREE_QUESTS)?,
            hunted: db.open_tree(TREE_HUNTED)?,
            meta: db.open_tree(TREE_META)?,
            db,
            town_center,
        };

        if seed_world {
            store.seed_world_if_needed()?;
        }

        Ok(store)
    }

    fn tile_key(x: i32, y: i32) -> Vec<u8> {
        format!("tiles:{}:{}", x, y).into_bytes()
    }

    fn monster_key(x: i32, y: i32) -> Vec<u8> {
        format!("monsters:{}:{}", x, y).into_bytes()
    }

    fn template_key(id: u32) -> Vec<u8> {
        format!("templates:{:010}", id).into_bytes()
    }

    fn character_key(id: u64) -> Vec<u8> {
        format!("characters:{:020}", id).into_bytes()
    }

    fn owner_key(owner: &str) -> Vec<u8> {
        format!("owners:{}", owner).into_bytes()
    }

    fn quest_prefix(character_id: u64) -> Vec<u8> {
        format!("quests:{:020}:", character_id).into_bytes()
    }

    fn quest_key(quest: &QuestRecord) -> Vec<u8> {
        format!(
            "quests:{:020}:{}:{:020}",
            quest.character_id,
            quest.kind().as_str(),
            quest.id
        )
        .into_bytes()
    }

    fn hunted_key(player: &str, template_id: u32) -> Vec<u8> {
        format!("hunted:{}:{:010}", player, template_id).into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, WorldError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: DeserializeOwned + Versioned>(bytes: &[u8]) -> Result<T, WorldError> {
        let record: T = bincode::deserialize(bytes)?;
        if record.schema_version() != T::VERSION {
            return Err(WorldError::SchemaMismatch {
                entity: T::ENTITY,
                expected: T::VERSION,
                found: record.schema_version(),
            });
        }
        Ok(record)
    }

    fn scan<T: DeserializeOwned + Versioned>(
        tree: &sled::Tree,
        prefix: &[u8],
    ) -> Result<Vec<T>, WorldError> {
        tree.scan_prefix(prefix)
            .map(|entry| {
                entry
                    .map_err(WorldError::from)
                    .and_then(|(_key, value)| Self::deserialize(&value))
            })
            .collect()
    }

    fn decode_counter(bytes: Option<&[u8]>) -> u64 {
        bytes
            .and_then(|b| <[u8; 8]>::try_from(b).ok())
            .map(u64::from_be_bytes)
            .unwrap_or(0)
    }

    pub fn town_center(&self) -> (i32, i32) {
        self.town_center
    }

    /// Allocate a fresh monotonic id for characters and quests.
    pub fn next_id(&self) -> Result<u64, WorldError> {
        Ok(self.db.generate_id()?)
    }

    pub fn flush(&self) -> Result<(), WorldError> {
        self.db.flush()?;
        Ok(())
    }

    // ----- tiles -----------------------------------------------------------

    pub fn get_tile(&self, x: i32, y: i32) -> Result<Option<TileRecord>, WorldError> {
        match self.tiles.get(Self::tile_key(x, y))? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert a tile unless one already exists at its position.
    ///
    /// Returns whichever record ends up stored (the new tile, or the one a
    /// concurrent writer got in first) and whether this call inserted it.
    pub fn insert_tile_if_absent(
        &self,
        tile: TileRecord,
    ) -> Result<(TileRecord, bool), WorldError> {
        let key = Self::tile_key(tile.x, tile.y);
        let bytes = Self::serialize(&tile)?;
        match self
            .tiles
            .compare_and_swap(&key, None as Option<&[u8]>, Some(bytes))?
        {
            Ok(()) => {
                self.tiles.flush()?;
                Ok((tile, true))
            }
            Err(cas) => match cas.current {
                Some(existing) => {
                    debug!(
                        "tile ({}, {}) already generated by a concurrent request; re-reading",
                        tile.x, tile.y
                    );
                    Ok((Self::deserialize(&existing)?, false))
                }
                None => Err(WorldError::Conflict(format!(
                    "tile ({}, {}) insert lost a race with a delete",
                    tile.x, tile.y
                ))),
            },
        }
    }

    pub fn list_tiles(&self) -> Result<Vec<TileRecord>, WorldError> {
        Self::scan(&self.tiles, b"tiles:")
    }

    /// Positions of every stored Town tile.
    pub fn town_positions(&self) -> Result<Vec<(i32, i32)>, WorldError> {
        Ok(self
            .list_tiles()?
            .into_iter()
            .filter(|tile| tile.kind == TerrainKind::Town)
            .map(|tile| (tile.x, tile.y))
            .collect())
    }

    pub fn count_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Create the town-center Town tile if the world is empty there.
    pub fn seed_world_if_needed(&self) -> Result<usize, WorldError> {
        let (x, y) = self.town_center;
        if self.get_tile(x, y)?.is_some() {
            return Ok(0);
        }
        let (_, inserted) = self.insert_tile_if_absent(TileRecord::new(x, y, TerrainKind::Town))?;
        if !inserted {
            return Ok(0);
        }
        info!("Seeded town center at ({}, {})", x, y);
        Ok(1)
    }

    /// Wipe tiles, monsters and the regeneration counter, then re-seed the town center.
    /// Characters, quests, templates and the hunt ledger are kept.
    pub fn reset_world(&self) -> Result<(), WorldError> {
        let tiles = self.tiles.len();
        let monsters = self.monsters.len();
        self.tiles.clear()?;
        self.monsters.clear()?;
        self.meta.remove(DEATHS_KEY)?;
        self.db.flush()?;
        info!("World reset: removed {} tiles and {} monsters", tiles, monsters);
        self.seed_world_if_needed()?;
        Ok(())
    }

    // ----- templates -------------------------------------------------------

    pub fn put_template(&self, mut template: MonsterTemplate) -> Result<(), WorldError> {
        template.schema_version = TEMPLATE_SCHEMA_VERSION;
        let key = Self::template_key(template.id);
        let bytes = Self::serialize(&template)?;
        self.templates.insert(key, bytes)?;
        self.templates.flush()?;
        Ok(())
    }

    /// Insert or overwrite a catalog, keyed by template id.
    pub fn seed_templates(&self, templates: &[MonsterTemplate]) -> Result<usize, WorldError> {
        let mut batch = Batch::default();
        for template in templates {
            let mut template = template.clone();
            template.schema_version = TEMPLATE_SCHEMA_VERSION;
            batch.insert(Self::template_key(template.id), Self::serialize(&template)?);
        }
        self.templates.apply_batch(batch)?;
        self.templates.flush()?;
        Ok(templates.len())
    }

    pub fn get_template(&self, id: u32) -> Result<MonsterTemplate, WorldError> {
        self.find_template(id)?
            .ok_or_else(|| WorldError::NotFound(format!("monster template: {}", id)))
    }

    pub fn find_template(&self, id: u32) -> Result<Option<MonsterTemplate>, WorldError> {
        match self.templates.get(Self::template_key(id))? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_templates(&self) -> Result<Vec<MonsterTemplate>, WorldError> {
        Self::scan(&self.templates, b"templates:")
    }

    // ----- monsters --------------------------------------------------------

    pub fn monster_at(&self, x: i32, y: i32) -> Result<Option<MonsterInstance>, WorldError> {
        match self.monsters.get(Self::monster_key(x, y))? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert a monster unless its tile is already occupied. Returns false when occupied.
    ///
    /// Not flushed; batch callers flush once at the end.
    pub fn insert_monster_if_absent(&self, monster: &MonsterInstance) -> Result<bool, WorldError> {
        let key = Self::monster_key(monster.x, monster.y);
        let bytes = Self::serialize(monster)?;
        Ok(self
            .monsters
            .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))?
            .is_ok())
    }

    pub fn put_monster(&self, mut monster: MonsterInstance) -> Result<(), WorldError> {
        monster.schema_version = MONSTER_SCHEMA_VERSION;
        let key = Self::monster_key(monster.x, monster.y);
        let bytes = Self::serialize(&monster)?;
        self.monsters.insert(key, bytes)?;
        self.monsters.flush()?;
        Ok(())
    }

    /// Remove the monster at `(x, y)`. Returns false if there was none.
    pub fn delete_monster(&self, x: i32, y: i32) -> Result<bool, WorldError> {
        let removed = self.monsters.remove(Self::monster_key(x, y))?;
        self.monsters.flush()?;
        Ok(removed.is_some())
    }

    pub fn list_monsters(&self) -> Result<Vec<MonsterInstance>, WorldError> {
        Self::scan(&self.monsters, b"monsters:")
    }

    pub fn list_monsters_by_template(
        &self,
        template_id: u32,
    ) -> Result<Vec<MonsterInstance>, WorldError> {
        Ok(self
            .list_monsters()?
            .into_iter()
            .filter(|m| m.template_id == template_id)
            .collect())
    }

    pub fn count_monsters(&self) -> usize {
        self.monsters.len()
    }

    pub fn occupied_positions(&self) -> Result<HashSet<(i32, i32)>, WorldError> {
        Ok(self.list_monsters()?.iter().map(|m| m.position()).collect())
    }

    // ----- characters ------------------------------------------------------

    /// Store a new character, claiming its owner. One character per owner.
    pub fn create_character(&self, character: &CharacterRecord) -> Result<(), WorldError> {
        let owner_key = Self::owner_key(&character.owner);
        let claimed = self.meta.compare_and_swap(
            owner_key,
            None as Option<&[u8]>,
            Some(character.id.to_be_bytes().to_vec()),
        )?;
        if claimed.is_err() {
            return Err(WorldError::Conflict(format!(
                "player {} already has a character",
                character.owner
            )));
        }
        self.put_character(character)
    }

    pub fn put_character(&self, character: &CharacterRecord) -> Result<(), WorldError> {
        let mut character = character.clone();
        character.schema_version = CHARACTER_SCHEMA_VERSION;
        let key = Self::character_key(character.id);
        let bytes = Self::serialize(&character)?;
        self.characters.insert(key, bytes)?;
        self.characters.flush()?;
        Ok(())
    }

    pub fn get_character(&self, id: u64) -> Result<CharacterRecord, WorldError> {
        let Some(bytes) = self.characters.get(Self::character_key(id))? else {
            return Err(WorldError::NotFound(format!("character: {}", id)));
        };
        Self::deserialize(&bytes)
    }

    pub fn find_character_by_owner(
        &self,
        owner: &str,
    ) -> Result<Option<CharacterRecord>, WorldError> {
        let Some(bytes) = self.meta.get(Self::owner_key(owner))? else {
            return Ok(None);
        };
        let id = Self::decode_counter(Some(bytes.as_ref()));
        match self.get_character(id) {
            Ok(character) => Ok(Some(character)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn list_character_ids(&self) -> Result<Vec<u64>, WorldError> {
        let mut ids = Vec::new();
        for entry in self.characters.scan_prefix(b"characters:") {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            if let Some(id) = text
                .strip_prefix("characters:")
                .and_then(|raw| raw.parse::<u64>().ok())
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    // ----- quests ----------------------------------------------------------

    pub fn put_quest(&self, quest: &QuestRecord) -> Result<(), WorldError> {
        self.put_quests(std::slice::from_ref(quest))
    }

    /// Write several quests in one atomic batch.
    pub fn put_quests(&self, quests: &[QuestRecord]) -> Result<(), WorldError> {
        if quests.is_empty() {
            return Ok(());
        }
        let mut batch = Batch::default();
        for quest in quests {
            batch.insert(Self::quest_key(quest), Self::serialize(quest)?);
        }
        self.quests.apply_batch(batch)?;
        self.quests.flush()?;
        Ok(())
    }

    pub fn list_quests(&self, character_id: u64) -> Result<Vec<QuestRecord>, WorldError> {
        Self::scan(&self.quests, &Self::quest_prefix(character_id))
    }

    pub fn list_active_quests(&self, character_id: u64) -> Result<Vec<QuestRecord>, WorldError> {
        Ok(self
            .list_quests(character_id)?
            .into_iter()
            .filter(QuestRecord::is_open)
            .collect())
    }

    // ----- hunt ledger -----------------------------------------------------

    /// Append a ledger entry unless the player already hunted this species.
    /// Returns true when a new entry was written.
    pub fn record_hunted_if_absent(&self, record: &HuntedRecord) -> Result<bool, WorldError> {
        let key = Self::hunted_key(&record.player, record.template_id);
        let bytes = Self::serialize(record)?;
        let inserted = self
            .hunted
            .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))?
            .is_ok();
        if inserted {
            self.hunted.flush()?;
        }
        Ok(inserted)
    }

    pub fn has_hunted(&self, player: &str, template_id: u32) -> Result<bool, WorldError> {
        Ok(self
            .hunted
            .contains_key(Self::hunted_key(player, template_id))?)
    }

    pub fn hunted_template_ids(&self, player: &str) -> Result<HashSet<u32>, WorldError> {
        let prefix = format!("hunted:{}:", player);
        let records: Vec<HuntedRecord> = Self::scan(&self.hunted, prefix.as_bytes())?;
        Ok(records
            .into_iter()
            .filter(|record| record.player == player)
            .map(|record| record.template_id)
            .collect())
    }

    // ----- regeneration counter --------------------------------------------

    /// Atomically bump the deaths-since-regeneration counter, returning the new value.
    pub fn increment_deaths(&self) -> Result<u64, WorldError> {
        let updated = self.meta.update_and_fetch(DEATHS_KEY, |old| {
            let next = Self::decode_counter(old) + 1;
            Some(next.to_be_bytes().to_vec())
        })?;
        Ok(Self::decode_counter(updated.as_deref()))
    }

    pub fn deaths_since_regen(&self) -> Result<u64, WorldError> {
        Ok(Self::decode_counter(self.meta.get(DEATHS_KEY)?.as_deref()))
    }

    pub fn reset_deaths(&self) -> Result<(), WorldError> {
        self.meta.remove(DEATHS_KEY)?;
        self.meta.flush()?;
        Ok(())
    }

    // ----- combat ----------------------------------------------------------

    /// Commit a combat resolution in one transaction across characters,
    /// monsters and quests.
    ///
    /// `quest_writes` receives the merged character and whether it levelled
    /// up, and returns the quest records to persist. It may run more than once
    /// if the transaction is retried.
    pub fn commit_combat<F>(
        &self,
        character_id: u64,
        character_write: CharacterWrite,
        monster_write: MonsterWrite<'_>,
        quest_writes: F,
    ) -> Result<CombatCommitted, WorldError>
    where
        F: Fn(&CharacterRecord, bool) -> Vec<QuestRecord>,
    {
        let character_key = Self::character_key(character_id);
        let monster_key = match monster_write {
            MonsterWrite::Wound(monster) => Self::monster_key(monster.x, monster.y),
            MonsterWrite::Remove { x, y } => Self::monster_key(x, y),
        };

        let outcome: Result<CombatCommitted, TransactionError<WorldError>> =
            (&self.characters, &self.monsters, &self.quests).transaction(
                |(characters, monsters, quests)| {
                    let Some(bytes) = characters.get(character_key.as_slice())? else {
                        return Err(ConflictableTransactionError::Abort(WorldError::NotFound(
                            format!("character: {}", character_id),
                        )));
                    };
                    let mut character: CharacterRecord =
                        Self::deserialize(&bytes).map_err(ConflictableTransactionError::Abort)?;
                    let level_up = character_write.apply(&mut character);
                    character.schema_version = CHARACTER_SCHEMA_VERSION;
                    let encoded =
                        Self::serialize(&character).map_err(ConflictableTransactionError::Abort)?;
                    characters.insert(character_key.as_slice(), encoded)?;

                    let monster_written = match monster_write {
                        MonsterWrite::Remove { .. } => {
                            monsters.remove(monster_key.as_slice())?.is_some()
                        }
                        MonsterWrite::Wound(wounded) => match monsters.get(monster_key.as_slice())? {
                            Some(bytes) => {
                                let mut stored: MonsterInstance = Self::deserialize(&bytes)
                                    .map_err(ConflictableTransactionError::Abort)?;
                                if stored.is_same_spawn(wounded) && wounded.hp < stored.hp {
                                    stored.hp = wounded.hp.max(0);
                                    let encoded = Self::serialize(&stored)
                                        .map_err(ConflictableTransactionError::Abort)?;
                                    monsters.insert(monster_key.as_slice(), encoded)?;
                                    true
                                } else {
                                    false
                                }
                            }
                            None => false,
                        },
                    };

                    let changed = quest_writes(&character, level_up);
                    for quest in &changed {
                        let encoded =
                            Self::serialize(quest).map_err(ConflictableTransactionError::Abort)?;
                        quests.insert(Self::quest_key(quest), encoded)?;
                    }

                    Ok::<_, ConflictableTransactionError<WorldError>>(CombatCommitted {
                        character,
                        level_up,
                        quests: changed,
                        monster_written,
                    })
                },
            );

        let committed = outcome.map_err(|e| match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => WorldError::Sled(inner),
        })?;
        self.db.flush()?;
        Ok(committed)
    }
}
