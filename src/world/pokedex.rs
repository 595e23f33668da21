//! Paged catalog browsing with per-player "hunted" flags.

use serde::{Deserialize, Serialize};

use crate::validation::{validate_identifier, MAX_NAME_LENGTH};
use crate::world::errors::WorldError;
use crate::world::storage::WorldStore;

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokedexFilter {
    /// Case-insensitive substring of the species name.
    pub name: Option<String>,
    /// Elemental types; an entry matches when either of its types is listed.
    pub types: Vec<String>,
    pub offset: usize,
    /// Zero or absent means the default; clamped to [`MAX_PAGE_LIMIT`].
    pub limit: Option<usize>,
}

impl PokedexFilter {
    /// Parse a comma separated type list such as `"fire, water"`.
    pub fn with_types_csv(mut self, types: &str) -> Self {
        self.types = types
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn effective_limit(&self) -> usize {
        match self.limit {
            None | Some(0) => DEFAULT_PAGE_LIMIT,
            Some(limit) => limit.min(MAX_PAGE_LIMIT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokedexEntry {
    pub id: u32,
    pub name: String,
    pub sprite: String,
    pub type1: String,
    pub type2: String,
    pub is_hunted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokedexPage {
    pub items: Vec<PokedexEntry>,
    /// Matches before paging.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// One page of the catalog for `player`, sorted by name.
pub fn pokedex(
    store: &WorldStore,
    player: &str,
    filter: &PokedexFilter,
) -> Result<PokedexPage, WorldError> {
    let player = validate_identifier("player", player, MAX_NAME_LENGTH)?;
    if store.find_character_by_owner(&player)?.is_none() {
        return Err(WorldError::NotFound(format!("player: {}", player)));
    }

    let needle = filter
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_lowercase);

    let mut matches: Vec<_> = store
        .list_templates()?
        .into_iter()
        .filter(|t| {
            needle
                .as_ref()
                .map_or(true, |n| t.name.to_lowercase().contains(n.as_str()))
        })
        .filter(|t| filter.types.is_empty() || filter.types.iter().any(|tag| t.has_type(tag)))
        .collect();
    matches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    let hunted = store.hunted_template_ids(&player)?;
    let limit = filter.effective_limit();
    let total = matches.len();
    let items = matches
        .into_iter()
        .skip(filter.offset)
        .take(limit)
        .map(|t| PokedexEntry {
            is_hunted: hunted.contains(&t.id),
            id: t.id,
            name: t.name,
            sprite: t.sprite,
            type1: t.type1,
            type2: t.type2,
        })
        .collect();

    Ok(PokedexPage {
        items,
        total,
        offset: filter.offset,
        limit,
    })
}
