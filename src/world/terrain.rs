//! Lazy terrain generation.
//!
//! A tile is rolled the first time anything looks at its coordinate and is
//! never re-rolled afterwards. The roll is a weighted draw over the terrain
//! kinds; every kind already present on an orthogonal neighbour gets a bonus,
//! so rivers, forests and roads tend to keep going.

use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::validation::validate_coordinates;
use crate::world::errors::WorldError;
use crate::world::rules::WorldRules;
use crate::world::storage::WorldStore;
use crate::world::types::{TerrainKind, TileRecord};

/// Weight added to a kind for being present on a neighbouring tile.
pub const NEIGHBOR_BONUS: u32 = 15;

/// Result of a lookup that may have generated the tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLookup {
    pub tile: TileRecord,
    /// True when this call created the tile.
    pub generated: bool,
}

/// Terrain kinds of the existing orthogonal neighbours of `(x, y)`.
pub fn neighbor_kinds(
    store: &WorldStore,
    rules: &WorldRules,
    x: i32,
    y: i32,
) -> Result<Vec<TerrainKind>, WorldError> {
    let mut kinds = Vec::with_capacity(4);
    for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
        let (nx, ny) = (x + dx, y + dy);
        if !rules.in_bounds(nx, ny) {
            continue;
        }
        if let Some(tile) = store.get_tile(nx, ny)? {
            kinds.push(tile.kind);
        }
    }
    Ok(kinds)
}

/// Weighted draw over `allowed`, biased towards kinds found in `neighbors`.
///
/// Falls back to grass if the weights are unusable (empty or all zero).
pub fn draw_kind<R: Rng + ?Sized>(
    rng: &mut R,
    allowed: &[TerrainKind],
    neighbors: &[TerrainKind],
) -> TerrainKind {
    let weights = allowed.iter().map(|kind| {
        let bonus = if neighbors.contains(kind) {
            NEIGHBOR_BONUS
        } else {
            0
        };
        kind.base_weight() + bonus
    });
    match WeightedIndex::new(weights) {
        Ok(dist) => allowed[dist.sample(rng)],
        Err(_) => TerrainKind::Grass,
    }
}

/// Return the tile at `(x, y)`, generating and storing it on first access.
pub fn get_or_create_tile<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    x: i32,
    y: i32,
) -> Result<TileRecord, WorldError> {
    Ok(materialize_tile(store, rules, rng, x, y, &TerrainKind::ALL)?.tile)
}

/// Like [`get_or_create_tile`], reporting whether the tile was generated.
///
/// `allowed` restricts the kinds a new tile may take; an existing tile is
/// returned as-is whatever its kind. The town center is always a Town.
pub fn materialize_tile<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    x: i32,
    y: i32,
    allowed: &[TerrainKind],
) -> Result<TileLookup, WorldError> {
    validate_coordinates(x, y, rules.world_size)?;

    if let Some(tile) = store.get_tile(x, y)? {
        return Ok(TileLookup {
            tile,
            generated: false,
        });
    }

    let kind = if rules.is_town_center(x, y) {
        TerrainKind::Town
    } else {
        let neighbors = neighbor_kinds(store, rules, x, y)?;
        draw_kind(rng, allowed, &neighbors)
    };

    let (tile, generated) = store.insert_tile_if_absent(TileRecord::new(x, y, kind))?;
    if generated {
        debug!("Generated {} tile at ({}, {})", tile.kind.as_str(), x, y);
    }
    Ok(TileLookup { tile, generated })
}
