//! Monster catalog seed data.
//!
//! Templates are loaded from `data/seeds/monsters.json` so admins can change
//! the catalog without recompiling. A small built-in catalog covers fresh
//! installs that ship without the file.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::validation::{validate_identifier, MAX_NAME_LENGTH};
use crate::world::errors::WorldError;
use crate::world::types::MonsterTemplate;

/// Template as written in the seed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TemplateSeed {
    id: u32,
    #[serde(default)]
    species_id: Option<u32>,
    name: String,
    hp: i32,
    attack: i32,
    defense: i32,
    xp: i32,
    #[serde(default)]
    sprite: String,
    #[serde(default)]
    types: Vec<String>,
}

impl TemplateSeed {
    fn into_template(self) -> Result<MonsterTemplate, WorldError> {
        let name = validate_identifier("monster name", &self.name, MAX_NAME_LENGTH)?;
        let mut types = self.types.into_iter();
        let type1 = types.next().unwrap_or_default();
        let type2 = types.next().unwrap_or_default();
        let mut template = MonsterTemplate::new(self.id, &name, self.hp, self.attack, self.defense, self.xp)
            .with_types(&type1, &type2)
            .with_sprite(&self.sprite);
        if let Some(species_id) = self.species_id {
            template.species_id = species_id;
        }
        Ok(template)
    }
}

/// Load monster templates from a JSON seed file.
///
/// Duplicate ids are rejected so a typo cannot silently shadow an entry.
pub fn load_templates_from_json<P: AsRef<Path>>(path: P) -> Result<Vec<MonsterTemplate>, WorldError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_templates(&contents).map_err(|e| match e {
        WorldError::Json(inner) => WorldError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse {}: {}", path.display(), inner),
        )),
        other => other,
    })
}

/// Parse the seed-file format from a string.
pub fn parse_templates(contents: &str) -> Result<Vec<MonsterTemplate>, WorldError> {
    let seeds: Vec<TemplateSeed> = serde_json::from_str(contents)?;
    let mut seen = HashSet::new();
    let mut templates = Vec::with_capacity(seeds.len());
    for seed in seeds {
        if !seen.insert(seed.id) {
            return Err(WorldError::Conflict(format!(
                "duplicate monster template id {}",
                seed.id
            )));
        }
        templates.push(seed.into_template()?);
    }
    Ok(templates)
}

/// Built-in catalog used when no seed file is available.
pub fn starter_templates() -> Vec<MonsterTemplate> {
    vec![
        MonsterTemplate::new(1, "Bulbasaur", 45, 49, 49, 64)
            .with_types("grass", "poison")
            .with_sprite("sprites/1.png"),
        MonsterTemplate::new(4, "Charmander", 39, 52, 43, 62)
            .with_types("fire", "")
            .with_sprite("sprites/4.png"),
        MonsterTemplate::new(7, "Squirtle", 44, 48, 65, 63)
            .with_types("water", "")
            .with_sprite("sprites/7.png"),
        MonsterTemplate::new(16, "Pidgey", 40, 45, 40, 50)
            .with_types("normal", "flying")
            .with_sprite("sprites/16.png"),
        MonsterTemplate::new(19, "Rattata", 30, 56, 35, 51)
            .with_types("normal", "")
            .with_sprite("sprites/19.png"),
        MonsterTemplate::new(25, "Pikachu", 35, 55, 40, 112)
            .with_types("electric", "")
            .with_sprite("sprites/25.png"),
        MonsterTemplate::new(41, "Zubat", 40, 45, 35, 49)
            .with_types("poison", "flying")
            .with_sprite("sprites/41.png"),
        MonsterTemplate::new(74, "Geodude", 40, 80, 100, 60)
            .with_types("rock", "ground")
            .with_sprite("sprites/74.png"),
    ]
}
