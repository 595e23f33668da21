//! # Gridrealm - persistent tile-world RPG engine
//!
//! Gridrealm is the game core of a small persistent-world RPG. Players own a
//! single character on a shared square grid, explore terrain that is rolled
//! lazily the first time anyone looks at it, fight the monsters that roam it
//! and work through an endless supply of generated quests.
//!
//! ## Features
//!
//! - **Lazy Terrain**: Tiles are generated on first access with a weighted draw biased by their neighbours, then never change.
//! - **Monster Population**: A capped population whose level grows with distance from the nearest town, regenerated in batches as monsters fall.
//! - **Combat**: Turn-based fights with a shared per-turn variance factor; previews never touch the store.
//! - **Quests**: Reach-tile, hunt-type and reach-level quests, topped up to a floor on demand and by a background sweep.
//! - **Pokedex**: Paged catalog browsing with per-player hunted flags.
//! - **Embedded Storage**: Everything lives in one sled database; combat results commit atomically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridrealm::world::{GameEngine, WorldRules};
//! use gridrealm::world::seed::starter_templates;
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = GameEngine::open("./data/world.db", WorldRules::default())?;
//!     engine.seed_catalog(&starter_templates())?;
//!     engine.ensure_monsters(50)?;
//!
//!     let hero = engine.create_character("ash@example.com", "Ash")?;
//!     let view = engine.neighborhood(hero.x, hero.y)?;
//!     println!("{}", serde_json::to_string_pretty(&view)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`world`] - terrain, population, combat, quests, views and the sled store
//! - [`config`] - TOML configuration
//! - [`validation`] - coordinate and identifier checks
//! - [`logutil`] - helpers for safe log lines

pub mod config;
pub mod logutil;
pub mod validation;
pub mod world;
