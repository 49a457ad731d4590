//! tsih - command-line inspector for versioned maps stored in SQLite.
//!
//! Keys are strings and values are JSON documents.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tsih_core::{MapConfig, SqliteRowStore, VersionNumber, VersionedMap};

type JsonMap = VersionedMap<String, Value>;

#[derive(Parser)]
#[command(name = "tsih", version, about = "Inspect and edit versioned maps")]
struct Cli {
    /// SQLite database holding the maps
    #[arg(long, env = "TSIH_DB_PATH")]
    db: PathBuf,

    /// Map name
    #[arg(long, env = "TSIH_NAME", default_value = "default")]
    name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a key (at the given version, or the latest one)
    Get {
        key: String,
        #[arg(long)]
        at: Option<VersionNumber>,
    },
    /// Write a JSON value for a key
    ///
    /// Without `--at` or `--next` the write lands at the latest version
    /// recorded for any key in the map, replacing a value already stored
    /// there for this key. Use `--next` to append a new version instead.
    Set {
        key: String,
        /// JSON value; bare words are stored as strings
        value: String,
        /// Version to write at, replacing any value already stored there
        #[arg(long, conflicts_with = "next")]
        at: Option<VersionNumber>,
        /// Write one past the latest recorded version
        #[arg(long)]
        next: bool,
    },
    /// Show every recorded version of a key
    History { key: String },
    /// List keys of the map
    Keys,
    /// Print every key readable at a version as one JSON object
    Dump {
        #[arg(long)]
        at: Option<VersionNumber>,
    },
    /// List map names stored in the database
    Names,
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn open_map(cli: &Cli) -> Result<JsonMap> {
    let config = MapConfig::persistent(&cli.db).with_name(&cli.name);
    let mut map = JsonMap::open(config)
        .with_context(|| format!("failed to open map '{}' in {}", cli.name, cli.db.display()))?;
    // Park the cursor on the newest history so bare reads see the latest values.
    if let Some(latest) = map.latest_version() {
        map.set_version(latest);
    }
    Ok(map)
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Get { key, at } => {
            let map = open_map(&cli)?;
            let value = match at {
                Some(version) => map.read_at(*version, key.as_str())?,
                None => map.read(key.as_str())?,
            };
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Command::Set {
            key,
            value,
            at,
            next,
        } => {
            let mut map = open_map(&cli)?;
            if let Some(version) = at {
                map.set_version(*version);
            } else if *next {
                let version = map.latest_version().map_or(0, |v| v + 1);
                map.set_version(version);
            }
            let version = map.write(key.clone(), parse_value(value))?;
            map.close()?;
            println!("{} @ {}", key, version);
        }
        Command::History { key } => {
            let map = open_map(&cli)?;
            if !map.contains_key(key.as_str()) {
                bail!("key '{}' has no history in map '{}'", key, cli.name);
            }
            for (version, value) in map.history(key.as_str()) {
                println!("{}\t{}", version, value);
            }
        }
        Command::Keys => {
            let map = open_map(&cli)?;
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
        }
        Command::Dump { at } => {
            let map = open_map(&cli)?;
            let version = at.unwrap_or_else(|| map.version());
            let snapshot: serde_json::Map<String, Value> = map
                .snapshot_at(version)
                .into_iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Names => {
            let store = SqliteRowStore::new(&cli.db)
                .with_context(|| format!("failed to open {}", cli.db.display()))?;
            for name in store.identifiers()? {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    debug!(db = %cli.db.display(), name = %cli.name, "Starting tsih");
    run(cli)
}
