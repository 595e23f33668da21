//! Binary entrypoint for the Gridrealm CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`, create the data dir and seed the monster catalog
//! - `serve` - open the world, fill the monster population and run the quest sweeper until Ctrl-C
//! - `view <x> <y>` - print the 3x3 neighbourhood around a cell as JSON
//! - `populate <n>` - make sure at least `n` monsters exist
//! - `reset` - clear the map and its monsters (characters and quests are kept)
//! - `status` - print record counts
//!
//! See the library crate docs for module-level details: `gridrealm::`.
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::sync::watch;

use gridrealm::config::{log_level_filter, Config};
use gridrealm::world::seed::{load_templates_from_json, starter_templates};
use gridrealm::world::{GameEngine, QuestSweeper};

#[derive(Parser)]
#[command(name = "gridrealm")]
#[command(about = "Persistent tile-world RPG engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration and seed the monster catalog
    Init,
    /// Run the world: populate monsters and sweep quests until interrupted
    Serve,
    /// Print the neighbourhood around a cell
    View {
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
    },
    /// Ensure at least N monsters exist (bounded by the configured cap)
    Populate { count: usize },
    /// Wipe tiles and monsters, keeping characters and quests
    Reset,
    /// Show world statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the config file, so it runs before any config is loaded.
    if matches!(cli.command, Commands::Init) {
        init_logging(&None, cli.verbose);
        return init(&cli.config).await;
    }
    let config = Config::load(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);

    match cli.command {
        Commands::Init => {}
        Commands::Serve => serve(config).await?,
        Commands::View { x, y } => {
            let engine = open_engine(&config)?;
            let view = engine.neighborhood(x, y)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Populate { count } => {
            let engine = open_engine(&config)?;
            let report = engine.ensure_monsters(count)?;
            println!(
                "Requested {}, generated {}{}",
                report.requested,
                report.generated,
                if report.capped { " (capped)" } else { "" }
            );
        }
        Commands::Reset => {
            let engine = open_engine(&config)?;
            engine.reset_world()?;
            println!("World reset.");
        }
        Commands::Status => {
            let engine = open_engine(&config)?;
            let status = engine.status()?;
            println!("Gridrealm v{}", env!("CARGO_PKG_VERSION"));
            println!("Database:   {}", config.storage.db_path().display());
            println!("Tiles:      {}", status.tiles);
            println!("Monsters:   {}/{}", status.monsters, status.max_monsters);
            println!("Templates:  {}", status.templates);
            println!("Characters: {}", status.characters);
            println!("Deaths since regeneration: {}", status.deaths_since_regen);
        }
    }

    Ok(())
}

fn open_engine(config: &Config) -> Result<GameEngine> {
    let path = config.storage.db_path();
    GameEngine::open(&path, config.world.clone())
        .with_context(|| format!("Failed to open world database at {}", path.display()))
}

async fn init(config_path: &str) -> Result<()> {
    info!("Initializing new Gridrealm configuration");
    if Path::new(config_path).exists() {
        warn!("{} already exists; keeping it", config_path);
    } else {
        Config::create_default(config_path).await?;
        info!("Configuration file created at {}", config_path);
    }
    let config = Config::load(config_path).await?;

    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .with_context(|| format!("Failed to create data dir {}", config.storage.data_dir))?;
    let engine = open_engine(&config)?;

    let templates = if Path::new(&config.storage.seed_file).exists() {
        load_templates_from_json(&config.storage.seed_file)?
    } else {
        info!(
            "No seed file at {}; using the built-in catalog",
            config.storage.seed_file
        );
        starter_templates()
    };
    let seeded = engine.seed_catalog(&templates)?;
    info!("Seeded {} monster templates", seeded);
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Gridrealm v{}", env!("CARGO_PKG_VERSION"));
    let engine = Arc::new(open_engine(&config)?);

    let report = engine.ensure_monsters(config.world.max_monsters)?;
    info!(
        "Population ready: {} spawned, {} alive",
        report.generated,
        engine.store().count_monsters()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = QuestSweeper::from_rules(engine.clone());
    let handle = sweeper.spawn(shutdown_rx);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);
    if let Err(e) = handle.await {
        warn!("Quest sweeper did not stop cleanly: {}", e);
    }
    engine.store().flush()?;
    info!("Gridrealm shutdown complete");
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let configured = config
        .as_ref()
        .and_then(|cfg| log_level_filter(&cfg.logging.level))
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
