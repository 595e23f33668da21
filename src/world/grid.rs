//! 3x3 neighbourhood views combining terrain and monster occupancy.
//!
//! Reading a view may generate terrain but never changes the monster
//! population.

use std::collections::HashMap;

use rand::Rng;

use crate::world::errors::WorldError;
use crate::world::rules::WorldRules;
use crate::world::storage::WorldStore;
use crate::world::terrain::get_or_create_tile;
use crate::world::types::{MonsterSummary, MonsterTemplate, NeighborhoodView, TileView};

const OFFSETS: [i32; 3] = [-1, 0, 1];

/// Build the view of the cell at `(x, y)` and its eight neighbours.
///
/// The center itself may lie off the grid: every offset is judged on its own,
/// so cells outside the world become inaccessible placeholders and are never
/// generated while in-bounds cells are.
pub fn neighborhood_view<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    x: i32,
    y: i32,
) -> Result<NeighborhoodView, WorldError> {
    let mut templates: HashMap<u32, Option<MonsterTemplate>> = HashMap::new();

    let mut rows = Vec::with_capacity(3);
    for dy in OFFSETS {
        let mut row = Vec::with_capacity(3);
        for dx in OFFSETS {
            row.push(cell_view(store, rules, rng, &mut templates, x, y, dx, dy)?);
        }
        rows.push(to_array(row)?);
    }

    Ok(NeighborhoodView {
        center_x: x,
        center_y: y,
        tiles: to_array(rows)?,
    })
}

#[allow(clippy::too_many_arguments)]
fn cell_view<R: Rng + ?Sized>(
    store: &WorldStore,
    rules: &WorldRules,
    rng: &mut R,
    templates: &mut HashMap<u32, Option<MonsterTemplate>>,
    x: i32,
    y: i32,
    dx: i32,
    dy: i32,
) -> Result<TileView, WorldError> {
    let (cx, cy) = match (x.checked_add(dx), y.checked_add(dy)) {
        (Some(cx), Some(cy)) if rules.in_bounds(cx, cy) => (cx, cy),
        _ => {
            return Ok(TileView::out_of_bounds(
                x.saturating_add(dx),
                y.saturating_add(dy),
            ))
        }
    };

    let tile = get_or_create_tile(store, rules, rng, cx, cy)?;
    let monster = match store.monster_at(cx, cy)? {
        Some(instance) => {
            if !templates.contains_key(&instance.template_id) {
                let template = store.find_template(instance.template_id)?;
                templates.insert(instance.template_id, template);
            }
            let template = templates.get(&instance.template_id).and_then(Option::as_ref);
            Some(MonsterSummary::from_instance(&instance, template))
        }
        None => None,
    };

    Ok(TileView {
        x: cx,
        y: cy,
        terrain: tile.kind.as_str().to_string(),
        accessible: tile.traversable,
        monster,
    })
}

fn to_array<T>(items: Vec<T>) -> Result<[T; 3], WorldError> {
    items
        .try_into()
        .map_err(|_| WorldError::Internal("neighbourhood row is not 3 cells wide".to_string()))
}
