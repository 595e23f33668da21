use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TILE_SCHEMA_VERSION: u8 = 1;
pub const TEMPLATE_SCHEMA_VERSION: u8 = 1;
pub const MONSTER_SCHEMA_VERSION: u8 = 1;
pub const CHARACTER_SCHEMA_VERSION: u8 = 1;
pub const QUEST_SCHEMA_VERSION: u8 = 1;
pub const HUNTED_SCHEMA_VERSION: u8 = 1;

/// Placeholder terrain label for cells outside the world.
pub const OUT_OF_BOUNDS: &str = "OUT_OF_BOUNDS";

const TILE_ASSET_DIR: &str = "assets/tiles/";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TerrainKind {
    Grass,
    Water,
    Mountain,
    Forest,
    Town,
    Road,
}

impl TerrainKind {
    pub const ALL: [TerrainKind; 6] = [
        TerrainKind::Grass,
        TerrainKind::Water,
        TerrainKind::Mountain,
        TerrainKind::Forest,
        TerrainKind::Town,
        TerrainKind::Road,
    ];

    /// Kinds a monster may be spawned onto when the tile does not exist yet.
    pub const MONSTER_HABITAT: [TerrainKind; 3] =
        [TerrainKind::Grass, TerrainKind::Forest, TerrainKind::Road];

    /// Base weight in the terrain draw (arbitrary integer units).
    pub fn base_weight(self) -> u32 {
        match self {
            TerrainKind::Grass => 20,
            TerrainKind::Water => 10,
            TerrainKind::Mountain => 15,
            TerrainKind::Forest => 15,
            TerrainKind::Town => 5,
            TerrainKind::Road => 35,
        }
    }

    /// Water and mountains block movement; settlements do not.
    pub fn is_traversable(self) -> bool {
        !matches!(self, TerrainKind::Water | TerrainKind::Mountain)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TerrainKind::Grass => "GRASS",
            TerrainKind::Water => "WATER",
            TerrainKind::Mountain => "MOUNTAIN",
            TerrainKind::Forest => "FOREST",
            TerrainKind::Town => "TOWN",
            TerrainKind::Road => "ROAD",
        }
    }

    pub fn asset(self) -> String {
        let file = match self {
            TerrainKind::Grass => "plains.png",
            TerrainKind::Water => "river.png",
            TerrainKind::Mountain => "mountain.png",
            TerrainKind::Forest => "forest.png",
            TerrainKind::Town => "town.png",
            TerrainKind::Road => "road.png",
        };
        format!("{}{}", TILE_ASSET_DIR, file)
    }
}

/// One generated grid cell. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileRecord {
    pub x: i32,
    pub y: i32,
    pub kind: TerrainKind,
    pub traversable: bool,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl TileRecord {
    pub fn new(x: i32, y: i32, kind: TerrainKind) -> Self {
        Self {
            x,
            y,
            kind,
            traversable: kind.is_traversable(),
            image: kind.asset(),
            created_at: Utc::now(),
            schema_version: TILE_SCHEMA_VERSION,
        }
    }

    /// Monsters never live in settlements or on impassable terrain.
    pub fn is_monster_habitat(&self) -> bool {
        self.traversable && self.kind != TerrainKind::Town
    }
}

/// Static species definition monsters are instantiated from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonsterTemplate {
    pub id: u32,
    #[serde(default)]
    pub species_id: u32,
    pub name: String,
    pub base_hp: i32,
    pub base_attack: i32,
    pub base_defense: i32,
    pub base_xp: i32,
    #[serde(default)]
    pub sprite: String,
    pub type1: String,
    #[serde(default)]
    pub type2: String,
    #[serde(default = "template_schema_version")]
    pub schema_version: u8,
}

fn template_schema_version() -> u8 {
    TEMPLATE_SCHEMA_VERSION
}

impl MonsterTemplate {
    pub fn new(id: u32, name: &str, base_hp: i32, base_attack: i32, base_defense: i32, base_xp: i32) -> Self {
        Self {
            id,
            species_id: id,
            name: name.to_string(),
            base_hp,
            base_attack,
            base_defense,
            base_xp,
            sprite: String::new(),
            type1: String::new(),
            type2: String::new(),
            schema_version: TEMPLATE_SCHEMA_VERSION,
        }
    }

    pub fn with_types(mut self, type1: &str, type2: &str) -> Self {
        self.type1 = type1.to_string();
        self.type2 = type2.to_string();
        self
    }

    pub fn with_sprite(mut self, sprite: &str) -> Self {
        self.sprite = sprite.to_string();
        self
    }

    /// True when `tag` names either elemental type. Empty types never match.
    pub fn has_type(&self, tag: &str) -> bool {
        !tag.is_empty()
            && (self.type1.eq_ignore_ascii_case(tag) || self.type2.eq_ignore_ascii_case(tag))
    }
}

/// A live monster occupying exactly one tile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonsterInstance {
    pub x: i32,
    pub y: i32,
    pub template_id: u32,
    pub level: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl MonsterInstance {
    pub fn spawn(x: i32, y: i32, template: &MonsterTemplate, level: i32) -> Self {
        let level = level.max(1);
        let max_hp = template.base_hp + level;
        Self {
            x,
            y,
            template_id: template.id,
            level,
            hp: max_hp,
            max_hp,
            attack: template.base_attack + level,
            defense: template.base_defense + level,
            created_at: Utc::now(),
            schema_version: MONSTER_SCHEMA_VERSION,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Same spawn on the same tile, as opposed to a later monster that took
    /// the tile over.
    pub fn is_same_spawn(&self, other: &MonsterInstance) -> bool {
        self.position() == other.position()
            && self.template_id == other.template_id
            && self.created_at == other.created_at
    }

    pub fn effective_attack(&self, template: &MonsterTemplate) -> i32 {
        template.base_attack + self.level
    }

    pub fn effective_defense(&self, template: &MonsterTemplate) -> i32 {
        template.base_defense + self.level
    }

    pub fn xp_reward(&self, template: &MonsterTemplate) -> i32 {
        template.base_xp + self.level * 10
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

/// Compact monster description embedded in tile views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonsterSummary {
    pub template_id: u32,
    pub name: String,
    pub sprite: String,
    pub level: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
}

impl MonsterSummary {
    pub fn from_instance(instance: &MonsterInstance, template: Option<&MonsterTemplate>) -> Self {
        Self {
            template_id: instance.template_id,
            name: template
                .map(|t| t.name.clone())
                .unwrap_or_else(|| "???".to_string()),
            sprite: template.map(|t| t.sprite.clone()).unwrap_or_default(),
            level: instance.level,
            hp: instance.hp,
            max_hp: instance.max_hp,
            attack: template
                .map(|t| instance.effective_attack(t))
                .unwrap_or(instance.attack),
        }
    }
}

pub const STARTING_LEVEL: i32 = 1;
pub const STARTING_HP: i32 = 100;
pub const STARTING_ATTACK: i32 = 10;
pub const STARTING_DEFENSE: i32 = 5;
pub const LEVEL_UP_HP_BONUS: i32 = 10;
pub const XP_PER_LEVEL: i32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterRecord {
    pub id: u64,
    /// Opaque player identity (one character per player).
    pub owner: String,
    pub name: String,
    pub level: i32,
    pub xp: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub x: i32,
    pub y: i32,
    pub home_x: i32,
    pub home_y: i32,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl CharacterRecord {
    pub fn new(id: u64, owner: &str, name: &str, home: (i32, i32)) -> Self {
        Self {
            id,
            owner: owner.to_string(),
            name: name.to_string(),
            level: STARTING_LEVEL,
            xp: 0,
            hp: STARTING_HP,
            max_hp: STARTING_HP,
            attack: STARTING_ATTACK,
            defense: STARTING_DEFENSE,
            x: home.0,
            y: home.1,
            home_x: home.0,
            home_y: home.1,
            created_at: Utc::now(),
            schema_version: CHARACTER_SCHEMA_VERSION,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn xp_to_next_level(&self) -> i32 {
        self.level * XP_PER_LEVEL
    }

    /// Add experience and level up once if the threshold is reached.
    ///
    /// Excess experience is discarded on level-up. Returns true on level-up.
    pub fn gain_xp(&mut self, xp: i32) -> bool {
        self.xp = self.xp.saturating_add(xp.max(0));
        if self.xp >= self.xp_to_next_level() {
            self.level_up();
            true
        } else {
            false
        }
    }

    fn level_up(&mut self) {
        self.level += 1;
        self.attack += 1;
        self.defense += 1;
        self.max_hp += LEVEL_UP_HP_BONUS;
        self.hp = self.max_hp;
        self.xp = 0;
    }

    pub fn restore_hp(&mut self) {
        self.hp = self.max_hp;
    }

    /// Defeat penalty: back to the home town with full health.
    pub fn teleport_home(&mut self) {
        self.x = self.home_x;
        self.y = self.home_y;
        self.restore_hp();
    }

    pub fn set_home(&mut self, x: i32, y: i32) {
        self.home_x = x;
        self.home_y = y;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestKind {
    Tile,
    Monster,
    Level,
}

impl QuestKind {
    pub const ALL: [QuestKind; 3] = [QuestKind::Tile, QuestKind::Monster, QuestKind::Level];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestKind::Tile => "tile",
            QuestKind::Monster => "monster",
            QuestKind::Level => "level",
        }
    }
}

/// Kind-specific quest payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestGoal {
    /// Step onto a given tile.
    Tile { x: i32, y: i32 },
    /// Defeat `kill_goal` monsters carrying the elemental `tag`.
    Monster {
        tag: String,
        kill_count: u32,
        kill_goal: u32,
    },
    /// Reach a character level.
    Level { level_goal: i32 },
}

impl QuestGoal {
    pub fn kind(&self) -> QuestKind {
        match self {
            QuestGoal::Tile { .. } => QuestKind::Tile,
            QuestGoal::Monster { .. } => QuestKind::Monster,
            QuestGoal::Level { .. } => QuestKind::Level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestRecord {
    pub id: u64,
    pub character_id: u64,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    pub is_completed: bool,
    pub goal: QuestGoal,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub schema_version: u8,
}

impl QuestRecord {
    pub fn new(id: u64, character_id: u64, title: &str, description: &str, goal: QuestGoal) -> Self {
        Self {
            id,
            character_id,
            title: title.to_string(),
            description: description.to_string(),
            is_active: true,
            is_completed: false,
            goal,
            created_at: Utc::now(),
            completed_at: None,
            schema_version: QUEST_SCHEMA_VERSION,
        }
    }

    pub fn kind(&self) -> QuestKind {
        self.goal.kind()
    }

    /// Active and not yet completed.
    pub fn is_open(&self) -> bool {
        self.is_active && !self.is_completed
    }

    pub fn mark_complete(&mut self) {
        self.is_completed = true;
        self.is_active = false;
        self.completed_at = Some(Utc::now());
    }
}

/// Discovery ledger entry: the player has defeated this species at least once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HuntedRecord {
    pub player: String,
    pub template_id: u32,
    pub hunted_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl HuntedRecord {
    pub fn new(player: &str, template_id: u32) -> Self {
        Self {
            player: player.to_string(),
            template_id,
            hunted_at: Utc::now(),
            schema_version: HUNTED_SCHEMA_VERSION,
        }
    }
}

/// One cell of a neighbourhood view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileView {
    pub x: i32,
    pub y: i32,
    /// Terrain label (`TerrainKind::as_str`) or [`OUT_OF_BOUNDS`].
    pub terrain: String,
    pub accessible: bool,
    pub monster: Option<MonsterSummary>,
}

impl TileView {
    pub fn out_of_bounds(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            terrain: OUT_OF_BOUNDS.to_string(),
            accessible: false,
            monster: None,
        }
    }

    pub fn is_out_of_bounds(&self) -> bool {
        self.terrain == OUT_OF_BOUNDS
    }
}

/// 3x3 view around a position, rows ordered by `dy` then `dx` (both -1..=1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeighborhoodView {
    pub center_x: i32,
    pub center_y: i32,
    pub tiles: [[TileView; 3]; 3],
}

impl NeighborhoodView {
    /// Cell at offset `(dx, dy)`, each in -1..=1.
    pub fn at(&self, dx: i32, dy: i32) -> Option<&TileView> {
        let row = usize::try_from(dy + 1).ok()?;
        let col = usize::try_from(dx + 1).ok()?;
        self.tiles.get(row)?.get(col)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileView> {
        self.tiles.iter().flat_map(|row| row.iter())
    }
}
